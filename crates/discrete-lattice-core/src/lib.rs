pub mod binomial;
pub mod error;
pub mod random_variable;
pub mod types;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use binomial::BinomialModel;
pub use error::LatticeError;
pub use random_variable::{DiscreteRandomVariable, Operand};
pub use types::*;

/// Standard result type for all discrete-lattice operations
pub type LatticeResult<T> = Result<T, LatticeError>;
