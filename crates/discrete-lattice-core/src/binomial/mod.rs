pub mod model;
pub mod pricing;

pub use model::{BinomialModel, BinomialModelParams, ReplicatingPortfolio};
