//! Bracketed scalar root finding.
//!
//! The Pegasus variant of regula falsi: superlinear on smooth residuals,
//! never leaves the bracket. Used as the fallback for one-dimensional
//! residuals when Newton stagnates, and directly for elements that cannot
//! supply a usable derivative.

use crate::error::{NumericsError, NumericsResult};
use hf_core::Real;

/// Result of a scalar bracketed solve.
#[derive(Clone, Copy, Debug)]
pub struct ScalarSolveReport {
    /// Converged root
    pub x: Real,
    /// Residual at the root
    pub residual: Real,
    /// Number of iterations
    pub iterations: usize,
}

/// Expand an initial interval until the residual changes sign.
///
/// The lower end stays fixed (it is usually a physical bound such as zero
/// storage); the upper end doubles away from it. Fails with `NonConvergence`
/// if no sign change is found, since a rootless residual must surface as an
/// error rather than an out-of-bound value.
pub fn find_bracket<F>(f: F, lo: Real, hi_init: Real) -> NumericsResult<(Real, Real)>
where
    F: Fn(Real) -> NumericsResult<Real>,
{
    const MAX_EXPANSIONS: usize = 60;

    let f_lo = f(lo)?;
    if f_lo == 0.0 {
        return Ok((lo, lo));
    }

    let mut hi = if hi_init > lo { hi_init } else { lo + 1.0 };
    for i in 0..MAX_EXPANSIONS {
        let f_hi = f(hi)?;
        if f_lo * f_hi <= 0.0 {
            return Ok((lo, hi));
        }
        hi = lo + (hi - lo) * 2.0;

        if i == MAX_EXPANSIONS - 1 {
            return Err(NumericsError::NonConvergence {
                iterations: MAX_EXPANSIONS,
                last_residual: f_hi,
                last_iterate: vec![hi],
            });
        }
    }
    unreachable!("loop always returns")
}

/// Find a root of `f` inside `[a, b]` with the Pegasus method.
///
/// Requires `f(a)` and `f(b)` to have opposite signs (or one of them to be
/// zero). `abs_tol` applies to the residual magnitude.
pub fn pegasus<F>(
    f: F,
    bracket: (Real, Real),
    abs_tol: Real,
    max_iterations: usize,
) -> NumericsResult<ScalarSolveReport>
where
    F: Fn(Real) -> NumericsResult<Real>,
{
    let (mut a, mut b) = bracket;
    let mut f_a = f(a)?;
    let mut f_b = f(b)?;

    if f_a == 0.0 {
        return Ok(ScalarSolveReport {
            x: a,
            residual: 0.0,
            iterations: 0,
        });
    }
    if f_b == 0.0 {
        return Ok(ScalarSolveReport {
            x: b,
            residual: 0.0,
            iterations: 0,
        });
    }
    if f_a * f_b > 0.0 {
        return Err(NumericsError::InvalidArg {
            what: "pegasus bracket must straddle a sign change",
        });
    }

    let mut x = b;
    let mut f_x = f_b;

    for iter in 0..max_iterations {
        // Secant step, guaranteed inside [a, b]
        x = b - f_b * (b - a) / (f_b - f_a);
        f_x = f(x)?;

        if f_x.abs() < abs_tol || (b - a).abs() < Real::EPSILON * b.abs().max(1.0) {
            return Ok(ScalarSolveReport {
                x,
                residual: f_x,
                iterations: iter + 1,
            });
        }

        if f_x * f_b < 0.0 {
            a = b;
            f_a = f_b;
        } else {
            // Pegasus scaling keeps the retained endpoint from stalling
            f_a = f_a * f_b / (f_b + f_x);
        }
        b = x;
        f_b = f_x;
    }

    Err(NumericsError::NonConvergence {
        iterations: max_iterations,
        last_residual: f_x,
        last_iterate: vec![x],
    })
}
