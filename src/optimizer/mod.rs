//! Risk-averse bidding model: variables, constraint families, LP assembly,
//! solver adapter, result extraction and the engine tying them together.

pub mod builder;
pub mod constraints;
pub mod engine;
pub mod extract;
pub mod solver;
pub mod variables;

pub use builder::*;
pub use engine::*;
pub use extract::*;
pub use solver::*;
pub use variables::*;
