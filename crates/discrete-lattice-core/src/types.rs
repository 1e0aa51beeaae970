use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single outcome of a discrete random variable.
pub type Outcome = Decimal;

/// Probability mass in [0, 1].
pub type Probability = Decimal;

/// Asset prices and option values. Wraps Decimal to prevent accidental f64 usage.
pub type Price = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Option payoff direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Exercise value at a terminal price.
    pub fn payoff(self, price: Price, strike: Price) -> Price {
        match self {
            OptionType::Call => (price - strike).max(Decimal::ZERO),
            OptionType::Put => (strike - price).max(Decimal::ZERO),
        }
    }
}

/// `true` is a call, `false` a put.
impl From<bool> for OptionType {
    fn from(call: bool) -> Self {
        if call {
            OptionType::Call
        } else {
            OptionType::Put
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Numeric representation tag for results computed in `Decimal`.
pub const DECIMAL_PRECISION_TAG: &str = "rust_decimal_128bit";

/// Numeric representation tag for results computed in `f64`.
pub const FLOAT_PRECISION_TAG: &str = "ieee754_f64";

/// Wrap a `Decimal` result with metadata.
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    with_metadata_tagged(
        methodology,
        assumptions,
        warnings,
        elapsed_us,
        result,
        DECIMAL_PRECISION_TAG,
    )
}

/// Wrap a result with metadata, recording `precision` as its numeric
/// representation.
pub fn with_metadata_tagged<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
    precision: &str,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: precision.to_string(),
        },
    }
}
