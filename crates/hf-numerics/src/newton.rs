//! Newton solver with line search and lower-bound constraints.

use crate::error::{NumericsError, NumericsResult};
use hf_core::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Newton solver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for residual norm
    pub abs_tol: Real,
    /// Relative tolerance for residual norm
    pub rel_tol: Real,
    /// Per-variable lower bounds rejected by the line search
    /// (e.g. non-negative storage). Empty means unconstrained.
    pub lower_bounds: Vec<Real>,
    /// Line search backtracking factor
    pub line_search_beta: Real,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            abs_tol: 1e-10,
            rel_tol: 1e-8,
            lower_bounds: Vec::new(),
            line_search_beta: 0.5,
            max_line_search_iters: 20,
        }
    }
}

/// Newton iteration result.
#[derive(Clone, Debug)]
pub struct SolveReport {
    /// Solution vector
    pub x: DVector<Real>,
    /// Final residual norm
    pub residual_norm: Real,
    /// Number of iterations
    pub iterations: usize,
}

/// Forward-difference Jacobian of `f` at `x`.
///
/// Residuals in this engine are small (usually one state per element), so
/// one extra residual evaluation per column beats carrying analytic
/// derivatives through every element. The perturbation is scaled by the
/// component magnitude to stay meaningful far from the origin.
pub fn finite_difference_jacobian<F>(
    x: &DVector<Real>,
    f: F,
    epsilon: Real,
) -> NumericsResult<DMatrix<Real>>
where
    F: Fn(&DVector<Real>) -> NumericsResult<DVector<Real>>,
{
    let base = f(x)?;
    let mut jac = DMatrix::zeros(base.len(), x.len());
    let mut probe = x.clone();
    for col in 0..x.len() {
        let h = epsilon * (1.0 + x[col].abs());
        probe[col] = x[col] + h;
        let shifted = f(&probe)?;
        jac.set_column(col, &((shifted - &base) / h));
        probe[col] = x[col];
    }
    Ok(jac)
}

/// Damped Newton iteration over a residual `G(x) = 0`.
///
/// Candidate iterates that violate a lower bound or produce a non-finite
/// residual are rejected by the backtracking line search; the committed
/// iterate therefore never leaves the physically valid region. If the line
/// search cannot find an acceptable candidate, or the iteration budget runs
/// out, a `NonConvergence` error carrying the last valid iterate is raised;
/// the caller decides whether a bracketed fallback applies.
pub fn newton_solve<F, J>(
    x0: DVector<Real>,
    residual_fn: F,
    jacobian_fn: J,
    config: &SolverConfig,
) -> NumericsResult<SolveReport>
where
    F: Fn(&DVector<Real>) -> NumericsResult<DVector<Real>>,
    J: Fn(&DVector<Real>) -> NumericsResult<DMatrix<Real>>,
{
    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut r_norm = r.norm();
    let r0_norm = r_norm;

    for iter in 0..config.max_iterations {
        // Check convergence
        if r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm {
            return Ok(SolveReport {
                x,
                residual_norm: r_norm,
                iterations: iter,
            });
        }

        // Compute Jacobian
        let jac = jacobian_fn(&x)?;

        // Solve J * dx = -r
        let dx = jac
            .lu()
            .solve(&(-r.clone()))
            .ok_or_else(|| NumericsError::Numeric {
                what: "Jacobian solve failed".to_string(),
            })?;

        // Backtracking line search: accept only candidates that reduce the
        // residual while staying inside the bounds. Exhausting the search
        // is a failure; the last committed iterate is still valid.
        let mut alpha = 1.0;
        let mut accepted = None;
        for _ in 0..=config.max_line_search_iters {
            let x_new = &x + alpha * &dx;
            let r_new = residual_fn(&x_new)?;
            let r_new_norm = r_new.norm();
            if within_bounds(&x_new, &config.lower_bounds)
                && r_new_norm.is_finite()
                && r_new_norm < r_norm
            {
                accepted = Some((x_new, r_new, r_new_norm));
                break;
            }
            alpha *= config.line_search_beta;
        }

        match accepted {
            Some((x_new, r_new, r_new_norm)) => {
                x = x_new;
                r = r_new;
                r_norm = r_new_norm;
            }
            None => {
                return Err(NumericsError::NonConvergence {
                    iterations: iter + 1,
                    last_residual: r_norm,
                    last_iterate: x.iter().copied().collect(),
                });
            }
        }
    }

    Err(NumericsError::NonConvergence {
        iterations: config.max_iterations,
        last_residual: r_norm,
        last_iterate: x.iter().copied().collect(),
    })
}

fn within_bounds(x: &DVector<Real>, lower_bounds: &[Real]) -> bool {
    lower_bounds
        .iter()
        .zip(x.iter())
        .all(|(lb, xi)| xi >= lb)
}
