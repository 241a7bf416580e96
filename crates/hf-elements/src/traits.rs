//! Capability traits for simulation elements.
//!
//! The element family is a set of independently composable capabilities,
//! not a class chain: every element implements `Element` (step in, fluxes
//! out); elements with tunable parameters add `Parameterized`; elements with
//! persistent storage add `Stateful`. Callers discover capabilities through
//! the `as_*` accessors, which return `None` for elements that lack them.

use crate::error::ElementResult;
use crate::param::Parameter;
use hf_core::{Real, StepSize};

/// Atomic simulation unit: consumes input fluxes for one time step and
/// produces output fluxes, optionally mutating internal state.
///
/// Elements are deterministic: identical configuration, inputs, and initial
/// state reproduce identical outputs.
pub trait Element: Send + Sync {
    /// Identifier, unique within the containing unit.
    fn id(&self) -> &str;

    /// Named input fluxes, in the order `step` expects them.
    fn input_names(&self) -> Vec<&str>;

    /// Named output fluxes, in the order `step` returns them.
    fn output_names(&self) -> Vec<&str>;

    /// Advance one time step.
    ///
    /// `inputs` carries one value per entry of `input_names`; the returned
    /// vector carries one value per entry of `output_names`.
    fn step(&mut self, dt: StepSize, inputs: &[Real]) -> ElementResult<Vec<Real>>;

    /// Number of future steps still holding buffered deliveries.
    ///
    /// Memoryless elements return 0; lag elements report their remaining
    /// window so a run can be extended to flush it.
    fn pending(&self) -> usize {
        0
    }

    fn as_parameterized(&self) -> Option<&dyn Parameterized> {
        None
    }

    fn as_parameterized_mut(&mut self) -> Option<&mut dyn Parameterized> {
        None
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        None
    }

    fn as_stateful_mut(&mut self) -> Option<&mut dyn Stateful> {
        None
    }
}

/// Capability: named parameters read at evaluation time.
pub trait Parameterized {
    fn parameter_names(&self) -> Vec<&str>;

    /// Handle to the parameter's shared cell. Cloning the handle shares the
    /// cell, so a write through any clone is visible to every element
    /// referencing it.
    fn parameter(&self, name: &str) -> Option<Parameter>;
}

/// Capability: persistent state read/written across steps.
pub trait Stateful {
    fn state_names(&self) -> Vec<String>;

    fn state(&self, name: &str) -> Option<Real>;

    /// Overwrite a state value (configuration phase only; stepping owns the
    /// state during a run).
    fn set_state(&mut self, name: &str, value: Real) -> ElementResult<()>;

    /// Restore every state to its declared initial value.
    fn reset(&mut self);
}
