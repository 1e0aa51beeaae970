use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Invalid exponent: {0} (must be a non-negative integer)")]
    InvalidExponent(i64),

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Arbitrage violation: requires d < 1 + rate < u (d={down}, 1+rate={growth}, u={up})")]
    ArbitrageViolation {
        down: Decimal,
        growth: Decimal,
        up: Decimal,
    },

    #[error("Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LatticeError {
    fn from(e: serde_json::Error) -> Self {
        LatticeError::SerializationError(e.to_string())
    }
}
