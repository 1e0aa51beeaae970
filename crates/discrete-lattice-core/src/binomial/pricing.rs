use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::model::{BinomialModel, BinomialModelParams};
use crate::random_variable::checked_pow;
use crate::types::*;
use crate::LatticeResult;

/// Largest tolerated gap between the convolution and backward-induction prices.
const LATTICE_AGREEMENT_TOLERANCE: Decimal = dec!(0.00000001);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinomialOptionInput {
    pub model: BinomialModelParams,
    pub strike_price: Price,
    pub option_type: OptionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinomialOptionOutput {
    /// Discounted risk-neutral expectation of the payoff
    pub price: Price,
    /// Same value by backward induction
    pub lattice_price: Price,
    /// One-step hedge ratio; absent for a zero-period model
    pub delta: Option<Decimal>,
    pub risk_neutral_up: Probability,
    pub risk_neutral_down: Probability,
    pub intrinsic_value: Price,
    pub time_value: Price,
    /// Opposite option implied by put-call parity
    pub put_call_parity_price: Price,
    pub moneyness: String,
    /// Distinct terminal prices after recombination
    pub terminal_outcomes: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn classify_moneyness(s: Price, k: Price, option_type: OptionType) -> String {
    if k.is_zero() {
        return "ITM".into();
    }
    let ratio = s / k;
    // ATM band: within 1% of strike
    let atm_lo = dec!(0.99);
    let atm_hi = dec!(1.01);
    let (itm, otm) = match option_type {
        OptionType::Call => (ratio > atm_hi, ratio < atm_lo),
        OptionType::Put => (ratio < atm_lo, ratio > atm_hi),
    };
    if itm {
        "ITM".into()
    } else if otm {
        "OTM".into()
    } else {
        "ATM".into()
    }
}

/// C - P = S - K / (1 + r)^n
fn parity_price(
    model: &BinomialModel,
    price: Price,
    strike: Price,
    option_type: OptionType,
) -> Price {
    let pv_strike = match checked_pow(Decimal::ONE + model.rate(), u64::from(model.periods())) {
        Some(factor) if !factor.is_zero() => strike / factor,
        _ => Decimal::ZERO,
    };
    match option_type {
        OptionType::Call => price - model.s0() + pv_strike,
        OptionType::Put => price + model.s0() - pv_strike,
    }
}

// ---------------------------------------------------------------------------
// Public API: price_european_option
// ---------------------------------------------------------------------------

/// Price a European option on a binomial tree.
///
/// The headline price comes from the random-variable convolution; the
/// backward-induction price is reported next to it and any disagreement is
/// surfaced as a warning.
pub fn price_european_option(
    input: &BinomialOptionInput,
) -> LatticeResult<ComputationOutput<BinomialOptionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let model = input.model.build()?;
    let k = input.strike_price;
    let option_type = input.option_type;

    let terminal = model.terminal_distribution()?;
    let price = model.european_option_evaluate(option_type, k)?;
    let lattice_price = model.european_option_evaluate_lattice(option_type, k)?;

    if (price - lattice_price).abs() > LATTICE_AGREEMENT_TOLERANCE {
        warnings.push(format!(
            "Convolution price {price} differs from lattice price {lattice_price}"
        ));
    }

    let delta = if model.periods() == 0 {
        warnings.push("Zero-period model: option has expired, delta not computed".into());
        None
    } else {
        Some(model.delta(option_type, k)?)
    };

    let intrinsic_value = option_type.payoff(model.s0(), k);
    let moneyness = classify_moneyness(model.s0(), k, option_type);
    if price.is_zero() && model.periods() > 0 {
        warnings.push("Option expires worthless on every path".into());
    }

    let (risk_neutral_up, risk_neutral_down) = model.risk_neutral();
    let output = BinomialOptionOutput {
        price,
        lattice_price,
        delta,
        risk_neutral_up,
        risk_neutral_down,
        intrinsic_value,
        time_value: price - intrinsic_value,
        put_call_parity_price: parity_price(&model, price, k, option_type),
        moneyness,
        terminal_outcomes: terminal.len(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Binomial Tree (risk-neutral convolution)",
        &serde_json::json!({
            "spot_price": model.s0().to_string(),
            "up_factor": model.up_factor().to_string(),
            "down_factor": model.down_factor().to_string(),
            "risk_free_rate": model.rate().to_string(),
            "periods": model.periods(),
            "strike_price": k.to_string(),
            "option_type": option_type,
        }),
        warnings,
        elapsed,
        output,
    ))
}
