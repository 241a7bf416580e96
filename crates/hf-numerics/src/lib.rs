//! hf-numerics: discretization and root finding for implicit-scheme elements.
//!
//! Provides:
//! - `Scheme`: turns a continuous state-derivative equation into a per-step
//!   algebraic residual (implicit Euler default, Crank-Nicolson, explicit
//!   Euler on the same interface)
//! - Damped Newton solver with line search, lower-bound constraints, and a
//!   forward-difference Jacobian helper
//! - Pegasus bracketed scalar root finding (fallback when Newton stagnates)

pub mod bracket;
pub mod error;
pub mod newton;
pub mod scheme;

// Re-exports for ergonomics
pub use bracket::{find_bracket, pegasus, ScalarSolveReport};
pub use error::{NumericsError, NumericsResult};
pub use newton::{finite_difference_jacobian, newton_solve, SolveReport, SolverConfig};
pub use scheme::{CrankNicolson, ExplicitEuler, ImplicitEuler, Scheme, SchemeKind};
