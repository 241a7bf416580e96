//! Concrete balance equations for storage reservoirs.
//!
//! Provides:
//! - [`LinearReservoir`]: outflow proportional to storage
//! - [`PowerLawReservoir`]: outflow proportional to a power of storage
//!
//! Both are plain `OdeRhs` implementations; pair them with an
//! [`crate::OdeElement`] to get a steppable element. Flux names default to
//! `inflow`/`outflow` and can be renamed so pipelines wire by name.

use crate::ode::OdeRhs;
use hf_core::Real;

/// Linear storage: `dS/dt = inflow - k*S`, outflow `k*S`.
pub struct LinearReservoir {
    input: String,
    output: String,
}

impl Default for LinearReservoir {
    fn default() -> Self {
        Self {
            input: "inflow".to_string(),
            output: "outflow".to_string(),
        }
    }
}

impl LinearReservoir {
    pub fn with_fluxes(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

impl OdeRhs for LinearReservoir {
    fn input_names(&self) -> Vec<&str> {
        vec![&self.input]
    }

    fn output_names(&self) -> Vec<&str> {
        vec![&self.output]
    }

    fn parameter_names(&self) -> Vec<&str> {
        vec!["k"]
    }

    fn state_names(&self) -> Vec<&str> {
        vec!["storage"]
    }

    fn derivative(&self, state: &[Real], inputs: &[Real], params: &[Real]) -> Vec<Real> {
        vec![inputs[0] - params[0] * state[0]]
    }

    fn outputs(&self, state: &[Real], inputs: &[Real], params: &[Real]) -> Vec<Real> {
        let _ = inputs;
        vec![params[0] * state[0]]
    }
}

/// Nonlinear storage: `dS/dt = inflow - k*S^alpha`, outflow `k*S^alpha`.
///
/// The root finder may probe negative candidate states; the outflow term
/// treats those as empty storage so fractional exponents stay real-valued.
pub struct PowerLawReservoir {
    input: String,
    output: String,
}

impl Default for PowerLawReservoir {
    fn default() -> Self {
        Self {
            input: "inflow".to_string(),
            output: "outflow".to_string(),
        }
    }
}

impl PowerLawReservoir {
    pub fn with_fluxes(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    fn outflow(state: Real, k: Real, alpha: Real) -> Real {
        k * state.max(0.0).powf(alpha)
    }
}

impl OdeRhs for PowerLawReservoir {
    fn input_names(&self) -> Vec<&str> {
        vec![&self.input]
    }

    fn output_names(&self) -> Vec<&str> {
        vec![&self.output]
    }

    fn parameter_names(&self) -> Vec<&str> {
        vec!["k", "alpha"]
    }

    fn state_names(&self) -> Vec<&str> {
        vec!["storage"]
    }

    fn derivative(&self, state: &[Real], inputs: &[Real], params: &[Real]) -> Vec<Real> {
        vec![inputs[0] - Self::outflow(state[0], params[0], params[1])]
    }

    fn outputs(&self, state: &[Real], inputs: &[Real], params: &[Real]) -> Vec<Real> {
        let _ = inputs;
        vec![Self::outflow(state[0], params[0], params[1])]
    }
}
