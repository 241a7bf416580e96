//! hf-core: stable foundation for hydroflex.
//!
//! Contains:
//! - numeric (Real + tolerances + step size + float helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
