//! Explicit linear programs
//!
//! A solver-independent description of an LP: typed variables with bounds,
//! affine expressions, and rows tagged by constraint family. Building a model
//! only allocates these values; solving is left to an [`crate::optimizer::LpSolver`].

pub mod expression;
pub mod program;

pub use expression::*;
pub use program::*;
