//! Error types for network composition and runs.

use hf_core::Real;
use hf_elements::ElementError;
use thiserror::Error;

use crate::network::RunOutput;

/// Build-time configuration errors. A built network has already passed all
/// of these checks, so stepping never re-validates structure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unit '{unit}' has no elements")]
    EmptyUnit { unit: String },

    #[error("Flux mismatch at {context}: expected {expected:?}, got {got:?}")]
    FluxMismatch {
        context: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("Node '{node}' has no units")]
    EmptyNode { node: String },

    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("Duplicate node '{0}'")]
    DuplicateNode(String),

    #[error("Routing topology contains a cycle through node '{0}'")]
    Cycle(String),

    #[error("Node '{0}' has more than one downstream edge")]
    MultipleDownstream(String),

    #[error("Series '{name}' has length {got}, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Bad weight {value} for unit '{unit}' in node '{node}'")]
    BadWeight {
        node: String,
        unit: String,
        value: Real,
    },

    #[error("Bad catchment area {value} for node '{node}'")]
    BadArea { node: String, value: Real },

    #[error("Bad routing kernel on edge '{edge}': {source}")]
    BadKernel { edge: String, source: ElementError },

    #[error("Unknown path '{0}'")]
    UnknownPath(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while preparing or executing a run.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Element(#[from] ElementError),

    /// A step failed mid-run. Outputs recorded before the failing step are
    /// kept in `partial` for diagnostics.
    #[error("Step {step}, node '{node}': {source}")]
    AtStep {
        step: usize,
        node: String,
        source: ElementError,
        partial: Box<RunOutput>,
    },

    #[error("Node '{node}' takes input fluxes but no forcing was set")]
    MissingForcing { node: String },
}

pub type NetworkResult<T> = Result<T, NetworkError>;
