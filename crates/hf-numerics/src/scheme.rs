//! Numerical approximation schemes.
//!
//! A `Scheme` discretizes a continuous balance equation `dS/dt = f(S)` into
//! the per-step algebraic residual `G(S_new) = 0` handed to the root finder.
//! Elements only supply the derivative closure and the start-of-step state;
//! nothing scheme-specific leaks into element code, so schemes are
//! interchangeable at construction time.

use hf_core::Real;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// State-derivative closure supplied by an element for one time step.
///
/// Inputs and parameters are already captured; the argument is only the
/// candidate state.
pub type Derivative<'a> = &'a dyn Fn(&[Real]) -> Vec<Real>;

/// Discretization strategy for one time step.
pub trait Scheme: Send + Sync {
    /// Scheme name for diagnostics.
    fn name(&self) -> &'static str;

    /// Residual `G(s_new)` for a candidate end-of-step state.
    ///
    /// `s_start` is the committed state at the start of the step and `dt`
    /// the step size. A root of `G` is the discretized end-of-step state.
    fn residual(
        &self,
        s_new: &DVector<Real>,
        s_start: &DVector<Real>,
        dt: Real,
        derivative: Derivative<'_>,
    ) -> DVector<Real>;
}

/// Backward (implicit) Euler: `G(S) = S - S0 - dt * f(S)`.
///
/// Unconditionally stable; the default for reservoir-style elements.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImplicitEuler;

impl Scheme for ImplicitEuler {
    fn name(&self) -> &'static str {
        "implicit-euler"
    }

    fn residual(
        &self,
        s_new: &DVector<Real>,
        s_start: &DVector<Real>,
        dt: Real,
        derivative: Derivative<'_>,
    ) -> DVector<Real> {
        let f_new = DVector::from_vec(derivative(s_new.as_slice()));
        s_new - s_start - dt * f_new
    }
}

/// Crank-Nicolson (trapezoidal): `G(S) = S - S0 - dt/2 * (f(S0) + f(S))`.
///
/// Second-order accurate in `dt`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CrankNicolson;

impl Scheme for CrankNicolson {
    fn name(&self) -> &'static str {
        "crank-nicolson"
    }

    fn residual(
        &self,
        s_new: &DVector<Real>,
        s_start: &DVector<Real>,
        dt: Real,
        derivative: Derivative<'_>,
    ) -> DVector<Real> {
        let f_start = DVector::from_vec(derivative(s_start.as_slice()));
        let f_new = DVector::from_vec(derivative(s_new.as_slice()));
        s_new - s_start - 0.5 * dt * (f_start + f_new)
    }
}

/// Forward (explicit) Euler: `G(S) = S - S0 - dt * f(S0)`.
///
/// Linear in `S`, so the root finder converges in a single step. Kept on the
/// implicit interface so schemes swap without touching element code.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExplicitEuler;

impl Scheme for ExplicitEuler {
    fn name(&self) -> &'static str {
        "explicit-euler"
    }

    fn residual(
        &self,
        s_new: &DVector<Real>,
        s_start: &DVector<Real>,
        dt: Real,
        derivative: Derivative<'_>,
    ) -> DVector<Real> {
        let f_start = DVector::from_vec(derivative(s_start.as_slice()));
        s_new - s_start - dt * f_start
    }
}

/// Scheme selection for configuration surfaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemeKind {
    #[default]
    ImplicitEuler,
    CrankNicolson,
    ExplicitEuler,
}

impl SchemeKind {
    /// Instantiate the scheme.
    pub fn build(self) -> Box<dyn Scheme> {
        match self {
            SchemeKind::ImplicitEuler => Box::new(ImplicitEuler),
            SchemeKind::CrankNicolson => Box::new(CrankNicolson),
            SchemeKind::ExplicitEuler => Box::new(ExplicitEuler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decay(s: &[Real]) -> Vec<Real> {
        // dS/dt = -2 S
        vec![-2.0 * s[0]]
    }

    #[test]
    fn implicit_euler_residual_at_exact_root() {
        // S_new = S0 / (1 + 2 dt) solves S_new - S0 + 2 dt S_new = 0
        let s0 = DVector::from_element(1, 1.0);
        let dt = 0.1;
        let s_new = DVector::from_element(1, 1.0 / (1.0 + 2.0 * dt));
        let r = ImplicitEuler.residual(&s_new, &s0, dt, &decay);
        assert!(r[0].abs() < 1e-12);
    }

    #[test]
    fn explicit_euler_residual_is_linear_in_candidate() {
        let s0 = DVector::from_element(1, 1.0);
        let dt = 0.1;
        // Root is S0 + dt*f(S0) regardless of the candidate
        let root = 1.0 + dt * decay(&[1.0])[0];
        let r = ExplicitEuler.residual(&DVector::from_element(1, root), &s0, dt, &decay);
        assert!(r[0].abs() < 1e-12);
    }

    #[test]
    fn crank_nicolson_exact_for_linear_rhs_average() {
        let s0 = DVector::from_element(1, 1.0);
        let dt = 0.1;
        // S_new (1 + dt) = S0 (1 - dt) for dS/dt = -2S
        let s_new = DVector::from_element(1, (1.0 - dt) / (1.0 + dt));
        let r = CrankNicolson.residual(&s_new, &s0, dt, &decay);
        assert!(r[0].abs() < 1e-12);
    }

    #[test]
    fn scheme_kind_round_trips_through_serde() {
        let json = serde_json::to_string(&SchemeKind::CrankNicolson).unwrap();
        let back: SchemeKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SchemeKind::CrankNicolson);
    }
}
