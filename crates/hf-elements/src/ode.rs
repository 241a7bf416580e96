//! Balance-equation elements solved by an implicit scheme.
//!
//! `OdeElement` is the engine half of a reservoir-style element: it owns the
//! state, parameters, scheme, and solver configuration, and runs the
//! discretize -> root-find -> bound-check -> commit cycle every step. The
//! domain half is an `OdeRhs`: the flux function and flux/parameter/state
//! names, nothing else. Swapping the scheme or solver never touches the
//! domain half.

use crate::error::{ElementError, ElementResult};
use crate::param::ParameterSet;
use crate::traits::{Element, Parameterized, Stateful};
use hf_core::{ensure_finite, Real, StepSize};
use hf_numerics::{
    find_bracket, finite_difference_jacobian, newton_solve, pegasus, NumericsError,
    NumericsResult, Scheme, SolverConfig,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Perturbation size for finite-difference Jacobians of step residuals.
const JACOBIAN_EPS: Real = 1e-7;

/// The continuous-time balance equation supplied by a concrete element.
///
/// Implementors provide the state-derivative and output-flux functions plus
/// the names the engine validates wiring against. All methods are pure;
/// state lives in the owning `OdeElement`.
pub trait OdeRhs: Send + Sync {
    fn input_names(&self) -> Vec<&str>;
    fn output_names(&self) -> Vec<&str>;
    fn parameter_names(&self) -> Vec<&str>;
    fn state_names(&self) -> Vec<&str>;

    /// `dS/dt` for a candidate state, under the given inputs and parameters.
    fn derivative(&self, state: &[Real], inputs: &[Real], params: &[Real]) -> Vec<Real>;

    /// Output fluxes derived from the committed end-of-step state.
    fn outputs(&self, state: &[Real], inputs: &[Real], params: &[Real]) -> Vec<Real>;

    /// Physical lower bound per state. Default: non-negative storage.
    fn lower_bounds(&self) -> Vec<Real> {
        vec![0.0; self.state_names().len()]
    }
}

/// What to do when a converged state lands outside its physical bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundPolicy {
    /// Clamp to the bound and log a warning (the default): the adjustment is
    /// visible, not silent.
    #[default]
    ClampWarn,
    /// Fail the step with a `DomainViolation`.
    Strict,
}

/// A state-and-parameter element whose step solves `G(S_new) = 0`.
pub struct OdeElement {
    id: String,
    rhs: Box<dyn OdeRhs>,
    parameters: ParameterSet,
    states: Vec<Real>,
    initial_states: Vec<Real>,
    scheme: Box<dyn Scheme>,
    solver: SolverConfig,
    policy: BoundPolicy,
}

impl OdeElement {
    /// Build an element; validation failures here are configuration errors
    /// and never reach a running simulation.
    pub fn new(
        id: impl Into<String>,
        rhs: Box<dyn OdeRhs>,
        parameters: ParameterSet,
        initial_states: Vec<Real>,
        scheme: Box<dyn Scheme>,
        solver: SolverConfig,
        policy: BoundPolicy,
    ) -> ElementResult<Self> {
        let id = id.into();

        // Every parameter the flux function reads must resolve now.
        parameters.snapshot(&rhs.parameter_names(), &id)?;

        if initial_states.len() != rhs.state_names().len() {
            return Err(ElementError::InvalidArg {
                what: "initial state count must match declared state names",
            });
        }
        for (value, bound) in initial_states.iter().zip(rhs.lower_bounds()) {
            ensure_finite(*value, "initial state")?;
            if *value < bound {
                return Err(ElementError::DomainViolation {
                    element: id,
                    what: "initial state below physical bound".to_string(),
                    value: *value,
                });
            }
        }

        Ok(Self {
            id,
            states: initial_states.clone(),
            initial_states,
            rhs,
            parameters,
            scheme,
            solver,
            policy,
        })
    }

    pub fn scheme_name(&self) -> &'static str {
        self.scheme.name()
    }

    pub fn states(&self) -> &[Real] {
        &self.states
    }
}

impl Element for OdeElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_names(&self) -> Vec<&str> {
        self.rhs.input_names()
    }

    fn output_names(&self) -> Vec<&str> {
        self.rhs.output_names()
    }

    fn step(&mut self, dt: StepSize, inputs: &[Real]) -> ElementResult<Vec<Real>> {
        let expected = self.rhs.input_names().len();
        if inputs.len() != expected {
            return Err(ElementError::FluxArity {
                element: self.id.clone(),
                expected,
                got: inputs.len(),
            });
        }

        // One consistent snapshot of (possibly shared) parameters per step.
        let params = self
            .parameters
            .snapshot(&self.rhs.parameter_names(), &self.id)?;
        let dt = dt.get();

        let s_start = DVector::from_vec(self.states.clone());
        let rhs = self.rhs.as_ref();
        let derivative = |s: &[Real]| rhs.derivative(s, inputs, &params);
        let scheme = self.scheme.as_ref();
        let residual = |x: &DVector<Real>| -> NumericsResult<DVector<Real>> {
            Ok(scheme.residual(x, &s_start, dt, &derivative))
        };
        let jacobian =
            |x: &DVector<Real>| finite_difference_jacobian(x, &residual, JACOBIAN_EPS);

        // Initial guess is always the previous converged state, so repeat
        // runs are bit-reproducible.
        let mut s_new: Vec<Real> = match newton_solve(s_start.clone(), &residual, jacobian, &self.solver)
        {
            Ok(report) => report.x.iter().copied().collect(),
            Err(NumericsError::NonConvergence { .. }) if self.states.len() == 1 => {
                // Scalar residuals get a bracketed second chance; the bracket
                // floor sits below the physical bound so a root that will be
                // clamped is still found.
                let s0 = self.states[0];
                let floor = self.rhs.lower_bounds()[0] - (1.0 + s0.abs());
                let scalar =
                    |s: Real| -> NumericsResult<Real> { Ok(residual(&DVector::from_element(1, s))?[0]) };
                let bracket = find_bracket(&scalar, floor, 2.0 * s0.abs() + 1.0)?;
                let report = pegasus(
                    &scalar,
                    bracket,
                    self.solver.abs_tol,
                    self.solver.max_iterations,
                )?;
                vec![report.x]
            }
            Err(e) => return Err(e.into()),
        };

        // Physical bounds: a converged state just outside is adjusted or
        // rejected, never silently discarded.
        let bounds = self.rhs.lower_bounds();
        let names = self.rhs.state_names();
        for (i, s) in s_new.iter_mut().enumerate() {
            ensure_finite(*s, "converged state")?;
            if *s < bounds[i] {
                match self.policy {
                    BoundPolicy::ClampWarn => {
                        warn!(
                            element = %self.id,
                            state = names[i],
                            value = *s,
                            bound = bounds[i],
                            "clamping converged state to physical bound"
                        );
                        *s = bounds[i];
                    }
                    BoundPolicy::Strict => {
                        return Err(ElementError::DomainViolation {
                            element: self.id.clone(),
                            what: names[i].to_string(),
                            value: *s,
                        });
                    }
                }
            }
        }

        let outputs = self.rhs.outputs(&s_new, inputs, &params);
        self.states = s_new;
        Ok(outputs)
    }

    fn as_parameterized(&self) -> Option<&dyn Parameterized> {
        Some(self)
    }

    fn as_parameterized_mut(&mut self) -> Option<&mut dyn Parameterized> {
        Some(self)
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        Some(self)
    }

    fn as_stateful_mut(&mut self) -> Option<&mut dyn Stateful> {
        Some(self)
    }
}

impl Parameterized for OdeElement {
    fn parameter_names(&self) -> Vec<&str> {
        self.rhs.parameter_names()
    }

    fn parameter(&self, name: &str) -> Option<crate::param::Parameter> {
        self.parameters.get(name)
    }
}

impl Stateful for OdeElement {
    fn state_names(&self) -> Vec<String> {
        self.rhs
            .state_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn state(&self, name: &str) -> Option<Real> {
        self.rhs
            .state_names()
            .iter()
            .position(|n| *n == name)
            .map(|i| self.states[i])
    }

    fn set_state(&mut self, name: &str, value: Real) -> ElementResult<()> {
        ensure_finite(value, "state value")?;
        let idx = self
            .rhs
            .state_names()
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| ElementError::UnknownState {
                element: self.id.clone(),
                name: name.to_string(),
            })?;
        if value < self.rhs.lower_bounds()[idx] {
            return Err(ElementError::DomainViolation {
                element: self.id.clone(),
                what: name.to_string(),
                value,
            });
        }
        self.states[idx] = value;
        Ok(())
    }

    fn reset(&mut self) {
        self.states = self.initial_states.clone();
    }
}
