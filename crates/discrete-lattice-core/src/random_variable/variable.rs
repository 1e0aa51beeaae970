use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::LatticeError;
use crate::types::{Outcome, Probability};
use crate::LatticeResult;

/// Decimal places outcomes are rounded to unless a precision is given.
pub const DEFAULT_PRECISION: u32 = 5;

/// Minimum precision used when one random variable divides another.
pub const DIVISION_PRECISION: u32 = 10;

/// Largest scale a Decimal can carry.
pub const MAX_PRECISION: u32 = 28;

/// Pointwise tolerance for equality and normalisation checks.
pub const TOLERANCE: Decimal = dec!(0.0000000001);

/// Decimal places used by the `Display` implementation.
pub const DISPLAY_DECIMALS: usize = 5;

pub const DEFAULT_NAME: &str = "X";

/// Supports longer than this are elided in the `Display` output.
const DISPLAY_FULL_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A finite probability mass function.
///
/// Outcomes are stored rounded to `precision` decimal places, distinct and
/// strictly ascending; `probability[i]` is the mass of `domain[i]` and the
/// masses sum to one. Every operation returns a new value: the only mutation
/// is [`DiscreteRandomVariable::rename`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RandomVariableRepr")]
pub struct DiscreteRandomVariable {
    name: String,
    domain: Vec<Outcome>,
    probability: Vec<Probability>,
    precision: u32,
}

/// Wire shape; always re-validated through the constructor.
#[derive(Debug, Clone, Deserialize)]
struct RandomVariableRepr {
    #[serde(default = "default_name")]
    name: String,
    domain: Vec<Outcome>,
    probability: Option<Vec<Decimal>>,
    #[serde(default = "default_precision")]
    precision: u32,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_precision() -> u32 {
    DEFAULT_PRECISION
}

impl TryFrom<RandomVariableRepr> for DiscreteRandomVariable {
    type Error = LatticeError;

    fn try_from(repr: RandomVariableRepr) -> Result<Self, Self::Error> {
        DiscreteRandomVariable::with_precision(
            &repr.domain,
            repr.probability.as_deref(),
            &repr.name,
            repr.precision,
        )
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

pub(crate) fn validate_name(name: &str) -> LatticeResult<()> {
    if name.trim().is_empty() {
        return Err(LatticeError::InvalidName(
            "name must contain at least one non-whitespace character".into(),
        ));
    }
    Ok(())
}

fn validate_weights(weights: &[Decimal], domain_len: usize) -> LatticeResult<Decimal> {
    if weights.len() != domain_len {
        return Err(LatticeError::InvalidWeights(format!(
            "domain size {domain_len} doesn't match weights size {}",
            weights.len()
        )));
    }
    if let Some(w) = weights.iter().find(|w| w.is_sign_negative() && !w.is_zero()) {
        return Err(LatticeError::InvalidWeights(format!(
            "weights must be non-negative, got {w}"
        )));
    }
    let total = weights
        .iter()
        .try_fold(Decimal::ZERO, |acc, w| acc.checked_add(*w))
        .ok_or_else(|| LatticeError::ArithmeticOverflow {
            context: "weight sum".into(),
        })?;
    if total <= Decimal::ZERO {
        return Err(LatticeError::InvalidWeights(
            "total weight must be positive".into(),
        ));
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl DiscreteRandomVariable {
    /// Build a random variable at the default precision.
    ///
    /// `weights` are arbitrary non-negative masses normalised by their sum;
    /// when omitted every outcome gets `1/n`.
    pub fn new(domain: &[Outcome], weights: Option<&[Decimal]>, name: &str) -> LatticeResult<Self> {
        Self::with_precision(domain, weights, name, DEFAULT_PRECISION)
    }

    /// Build a random variable whose outcomes are rounded to `precision` places.
    pub fn with_precision(
        domain: &[Outcome],
        weights: Option<&[Decimal]>,
        name: &str,
        precision: u32,
    ) -> LatticeResult<Self> {
        validate_name(name)?;
        if precision > MAX_PRECISION {
            return Err(LatticeError::InvalidInput {
                field: "precision".into(),
                reason: format!("must be at most {MAX_PRECISION}"),
            });
        }
        if domain.is_empty() {
            return Err(LatticeError::InvalidDomain(
                "domain must contain at least one outcome".into(),
            ));
        }

        let n = domain.len();
        let (weights, total) = match weights {
            Some(w) => (w.to_vec(), validate_weights(w, n)?),
            None => (vec![Decimal::ONE; n], Decimal::from(n as u64)),
        };

        let mut pairs: Vec<(Outcome, Probability)> = domain
            .iter()
            .map(|x| x.round_dp(precision))
            .zip(weights.iter().map(|w| w / total))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        if let Some(dup) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(LatticeError::InvalidDomain(format!(
                "outcome {} appears more than once at precision {precision}",
                dup[0].0
            )));
        }

        let (domain, probability): (Vec<Outcome>, Vec<Probability>) = pairs.into_iter().unzip();
        Ok(Self {
            name: name.to_string(),
            domain,
            probability,
            precision,
        })
    }

    /// Equally likely outcomes named with the default label.
    pub fn uniform(domain: &[Outcome]) -> LatticeResult<Self> {
        Self::new(domain, None, DEFAULT_NAME)
    }

    /// Deterministic variable taking `value` with probability one.
    pub fn constant(value: Outcome) -> Self {
        Self::constant_named(value, value.to_string(), DEFAULT_PRECISION)
    }

    pub(crate) fn constant_named(value: Outcome, name: String, precision: u32) -> Self {
        Self {
            name,
            domain: vec![value.round_dp(precision)],
            probability: vec![Decimal::ONE],
            precision,
        }
    }

    /// Materialise an accumulated outcome → mass map.
    ///
    /// Keys are already rounded and the map keeps them sorted and distinct, so
    /// only renormalisation is needed.
    pub(crate) fn from_merged(
        merged: BTreeMap<Outcome, Probability>,
        name: String,
        precision: u32,
    ) -> Self {
        let total: Decimal = merged.values().sum();
        let (domain, probability): (Vec<Outcome>, Vec<Probability>) = merged
            .into_iter()
            .map(|(x, p)| if total.is_zero() { (x, p) } else { (x, p / total) })
            .unzip();
        Self {
            name,
            domain,
            probability,
            precision,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &[Outcome] {
        &self.domain
    }

    pub fn probability(&self) -> &[Probability] {
        &self.probability
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    /// Always false: a random variable has at least one outcome.
    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        self.domain.len() == 1
    }

    /// `(outcome, probability)` pairs in ascending outcome order.
    pub fn iter(&self) -> impl Iterator<Item = (Outcome, Probability)> + '_ {
        self.domain
            .iter()
            .copied()
            .zip(self.probability.iter().copied())
    }

    /// Mass at `x` after rounding to this variable's precision; zero when absent.
    pub fn probability_of(&self, x: Outcome) -> Probability {
        let key = x.round_dp(self.precision);
        match self.domain.binary_search(&key) {
            Ok(i) => self.probability[i],
            Err(_) => Decimal::ZERO,
        }
    }

    // -----------------------------------------------------------------------
    // Copy / rename
    // -----------------------------------------------------------------------

    /// Independent duplicate, optionally under a new name.
    pub fn copy(&self, name: Option<&str>) -> LatticeResult<Self> {
        let mut copied = self.clone();
        if let Some(name) = name {
            copied.rename(name)?;
        }
        Ok(copied)
    }

    pub fn rename(&mut self, name: &str) -> LatticeResult<()> {
        validate_name(name)?;
        self.name = name.to_string();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------------

fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < TOLERANCE
}

impl PartialEq for DiscreteRandomVariable {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((x, p), (y, q))| within_tolerance(x, y) && within_tolerance(p, q))
    }
}

/// A deterministic variable equals the scalar it always takes.
impl PartialEq<Decimal> for DiscreteRandomVariable {
    fn eq(&self, other: &Decimal) -> bool {
        self.is_constant() && within_tolerance(self.domain[0], *other)
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for DiscreteRandomVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Discrete Random Variable {}:", self.name)?;
        let line = |f: &mut fmt::Formatter<'_>, i: usize| {
            writeln!(
                f,
                "\tP({}={:.prec$})={:.prec$}",
                self.name,
                self.domain[i],
                self.probability[i],
                prec = DISPLAY_DECIMALS
            )
        };
        let n = self.len();
        if n > DISPLAY_FULL_LIMIT {
            line(f, 0)?;
            line(f, 1)?;
            writeln!(f, "\t...")?;
            line(f, n - 2)?;
            line(f, n - 1)
        } else {
            (0..n).try_for_each(|i| line(f, i))
        }
    }
}
