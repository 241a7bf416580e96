//! Error types for numeric operations.

use hf_core::{CoreError, Real};
use thiserror::Error;

/// Errors raised by the discretization and root-finding machinery.
#[derive(Error, Debug, Clone)]
pub enum NumericsError {
    /// The iteration budget ran out before the residual met tolerance.
    ///
    /// Carries the last iterate and residual so the failing time step can be
    /// diagnosed. Fatal: callers must not treat the last iterate as a result.
    #[error(
        "No convergence after {iterations} iterations \
         (last residual norm {last_residual:e}, last iterate {last_iterate:?})"
    )]
    NonConvergence {
        iterations: usize,
        last_residual: Real,
        last_iterate: Vec<Real>,
    },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("{0}")]
    Core(#[from] CoreError),
}

pub type NumericsResult<T> = Result<T, NumericsError>;
