use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::binomial::BinomialModelParams;
use crate::error::LatticeError;
use crate::random_variable::checked_pow;
use crate::types::{with_metadata_tagged, ComputationOutput, Price, FLOAT_PRECISION_TAG};
use crate::LatticeResult;

/// Fewer paths than this give meaningless percentiles.
pub const MIN_SIMULATION_PATHS: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for simulating price paths under the real-world measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSimulationInput {
    pub model: BinomialModelParams,
    /// Number of simulated paths (minimum 100).
    #[serde(default = "default_num_paths")]
    pub num_paths: u32,
    /// Optional seed for reproducibility.
    pub seed: Option<u64>,
}

fn default_num_paths() -> u32 {
    10_000
}

/// Percentile summary of terminal prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalPercentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Observed versus exact mass at one terminal node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeFrequency {
    pub price: f64,
    pub probability: f64,
    pub frequency: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSimulationOutput {
    pub num_paths: u32,
    pub terminal_mean: f64,
    pub terminal_std_dev: f64,
    pub terminal_min: f64,
    pub terminal_max: f64,
    pub percentiles: TerminalPercentiles,
    /// s0 · E[R]^periods under the real-world increment
    pub analytical_mean: f64,
    pub mean_error: f64,
    /// One entry per terminal node, ascending by price
    pub outcome_frequencies: Vec<OutcomeFrequency>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate `num_paths` price paths with [`BinomialModel::pick`] and compare
/// the terminal prices against the exact real-world terminal distribution.
///
/// [`BinomialModel::pick`]: crate::binomial::BinomialModel::pick
pub fn run_path_simulation(
    input: &PathSimulationInput,
) -> LatticeResult<ComputationOutput<PathSimulationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.num_paths < MIN_SIMULATION_PATHS {
        return Err(LatticeError::InvalidInput {
            field: "num_paths".into(),
            reason: format!("Must be at least {MIN_SIMULATION_PATHS}"),
        });
    }

    let model = input.model.build()?;
    let exact = model.terminal_distribution_real_world()?;

    let mut rng = match input.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let n = input.num_paths as usize;
    let mut terminal: Vec<f64> = Vec::with_capacity(n);
    let mut counts: BTreeMap<Price, u32> = BTreeMap::new();
    for _ in 0..n {
        let path = model.pick(&mut rng)?;
        let last = path[path.len() - 1];
        *counts.entry(last.round_dp(exact.precision())).or_insert(0) += 1;
        terminal.push(to_f64(last));
    }

    let terminal_mean = terminal.iter().mean();
    let terminal_std_dev = terminal.iter().population_std_dev();
    let terminal_min = terminal.iter().copied().fold(f64::INFINITY, f64::min);
    let terminal_max = terminal.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut data = Data::new(terminal);
    let percentiles = TerminalPercentiles {
        p5: data.percentile(5),
        p25: data.percentile(25),
        p50: data.percentile(50),
        p75: data.percentile(75),
        p95: data.percentile(95),
    };

    let growth = model.increment().expectation()?;
    let analytical = checked_pow(growth, u64::from(model.periods()))
        .and_then(|g| g.checked_mul(model.s0()))
        .ok_or_else(|| LatticeError::ArithmeticOverflow {
            context: "analytical terminal mean".into(),
        })?;
    let analytical_mean = to_f64(analytical);

    let outcome_frequencies: Vec<OutcomeFrequency> = exact
        .iter()
        .map(|(price, probability)| {
            let count = counts.get(&price).copied().unwrap_or(0);
            OutcomeFrequency {
                price: to_f64(price),
                probability: to_f64(probability),
                frequency: count as f64 / n as f64,
                count,
            }
        })
        .collect();

    let unmatched = n as u32 - outcome_frequencies.iter().map(|o| o.count).sum::<u32>();
    if unmatched > 0 {
        warnings.push(format!(
            "{unmatched} simulated terminal prices did not land on a lattice node"
        ));
    }

    tracing::debug!(
        num_paths = n,
        seed = ?input.seed,
        terminal_mean,
        analytical_mean,
        "ran binomial path simulation"
    );

    let output = PathSimulationOutput {
        num_paths: input.num_paths,
        terminal_mean,
        terminal_std_dev,
        terminal_min,
        terminal_max,
        percentiles,
        analytical_mean,
        mean_error: terminal_mean - analytical_mean,
        outcome_frequencies,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_tagged(
        "Binomial Path Simulation",
        &serde_json::json!({
            "num_paths": input.num_paths,
            "seed": input.seed,
            "periods": model.periods(),
        }),
        warnings,
        elapsed,
        output,
        FLOAT_PRECISION_TAG,
    ))
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
