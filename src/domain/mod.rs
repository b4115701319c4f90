pub mod inputs;
pub mod risk;

pub use inputs::*;
pub use risk::*;
