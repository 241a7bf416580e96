//! Error types for element operations.

use hf_core::{CoreError, Real};
use hf_numerics::NumericsError;
use thiserror::Error;

/// Errors raised while configuring or stepping an element.
#[derive(Error, Debug)]
pub enum ElementError {
    #[error("Element '{element}': unknown parameter '{name}'")]
    UnknownParameter { element: String, name: String },

    #[error("Element '{element}': unknown state '{name}'")]
    UnknownState { element: String, name: String },

    #[error("Element '{element}': expected {expected} input fluxes, got {got}")]
    FluxArity {
        element: String,
        expected: usize,
        got: usize,
    },

    /// A computed or assigned state left its declared physical bounds under
    /// the strict policy.
    #[error("Element '{element}': domain violation, {what} = {value}")]
    DomainViolation {
        element: String,
        what: String,
        value: Real,
    },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("{0}")]
    Numerics(#[from] NumericsError),

    #[error("{0}")]
    Core(#[from] CoreError),
}

pub type ElementResult<T> = Result<T, ElementError>;
