//! hf-elements: the atomic simulation units of hydroflex.
//!
//! Provides:
//! - Capability traits (`Element`, `Parameterized`, `Stateful`) composed as
//!   needed instead of a fixed class chain
//! - Shared parameter cells (`Parameter`, `ParameterSet`)
//! - `OdeElement`: implicit-scheme balance-equation element driven by a
//!   pluggable `Scheme` and the Newton/Pegasus root finders
//! - `LagElement`: ring-buffer time delay driven by a `LagKernel`
//! - Reference reservoirs (`LinearReservoir`, `PowerLawReservoir`) showing
//!   the `OdeRhs` extension seam

pub mod error;
pub mod lag;
pub mod ode;
pub mod param;
pub mod reservoirs;
pub mod traits;

// Re-exports for public API
pub use error::{ElementError, ElementResult};
pub use lag::{normalized_weights, DelayedUniformKernel, LagElement, LagKernel, TriangularKernel};
pub use ode::{BoundPolicy, OdeElement, OdeRhs};
pub use param::{Parameter, ParameterSet};
pub use reservoirs::{LinearReservoir, PowerLawReservoir};
pub use traits::{Element, Parameterized, Stateful};
