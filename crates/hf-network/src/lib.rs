//! hf-network: composition and routing for hydroflex models.
//!
//! Provides:
//! - `Unit`: an ordered element pipeline, wired by flux name at build time
//! - `Node`: area-weighted combination of units sharing one forcing
//! - `NetworkBuilder` / `Network`: a validated routing DAG stepped in
//!   topological order, with optional lag kernels on edges and automatic
//!   draining of trailing deliveries
//! - `Registry` dot paths (`node.unit.element.name`) for parameter and
//!   state introspection, the surface external calibration tools consume

pub mod error;
pub mod network;
pub mod node;
pub mod registry;
pub mod unit;

// Re-exports for public API
pub use error::{ConfigError, ConfigResult, NetworkError, NetworkResult};
pub use network::{Network, NetworkBuilder, RunOptions, RunOutput};
pub use node::Node;
pub use registry::Registry;
pub use unit::Unit;
