use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures of the base numeric layer.
///
/// `Clone` so higher layers can stash the error in a per-step report while
/// also propagating it.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// A quantity that must be a finite number came out NaN or infinite.
    #[error("{what} is not finite (got {value})")]
    NonFinite { what: &'static str, value: f64 },

    /// A caller-supplied value failed validation.
    #[error("invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
