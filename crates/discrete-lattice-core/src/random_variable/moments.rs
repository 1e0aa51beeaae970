use rand::Rng;
use rust_decimal::{Decimal, MathematicalOps};

use super::variable::DiscreteRandomVariable;
use crate::error::LatticeError;
use crate::types::Outcome;
use crate::LatticeResult;

/// Uniform draws are taken on a grid of this many points in [0, 1).
const SAMPLE_RESOLUTION: i64 = 1_000_000_000_000_000_000;
const SAMPLE_SCALE: u32 = 18;

impl DiscreteRandomVariable {
    /// E[X]
    pub fn expectation(&self) -> LatticeResult<Decimal> {
        self.expectation_of(|x| x)
    }

    /// E[f(X)] = Σ f(x_i)·p_i
    pub fn expectation_of(&self, f: impl Fn(Outcome) -> Decimal) -> LatticeResult<Decimal> {
        self.weighted_sum("expectation", |x| Some(f(x)))
    }

    /// E[X] rounded to `decimals` places, for display and comparison.
    pub fn expectation_rounded(&self, decimals: u32) -> LatticeResult<Decimal> {
        Ok(self.expectation()?.round_dp(decimals))
    }

    /// Second central moment, `E[(X - μ)²]`.
    pub fn dispersion(&self) -> LatticeResult<Decimal> {
        let mu = self.expectation()?;
        self.weighted_sum("dispersion", |x| {
            let deviation = x.checked_sub(mu)?;
            deviation.checked_mul(deviation)
        })
    }

    pub fn std_dev(&self) -> LatticeResult<Decimal> {
        Ok(self.dispersion()?.sqrt().unwrap_or(Decimal::ZERO))
    }

    /// Σ g(x_i)·p_i with every step checked; `g` returns `None` on overflow.
    fn weighted_sum(
        &self,
        what: &str,
        g: impl Fn(Outcome) -> Option<Decimal>,
    ) -> LatticeResult<Decimal> {
        self.iter()
            .try_fold(Decimal::ZERO, |acc, (x, p)| {
                g(x)?.checked_mul(p).and_then(|term| acc.checked_add(term))
            })
            .ok_or_else(|| LatticeError::ArithmeticOverflow {
                context: format!("{what} of {}", self.name()),
            })
    }

    /// Draw one outcome.
    ///
    /// A uniform value in [0, 1) is compared against the running sum of the
    /// masses in ascending outcome order; the first outcome whose cumulative
    /// mass exceeds the draw is returned.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Outcome {
        let draw = Decimal::new(rng.gen_range(0..SAMPLE_RESOLUTION), SAMPLE_SCALE);
        let mut cumulative = Decimal::ZERO;
        for (x, p) in self.iter() {
            cumulative += p;
            if cumulative > draw {
                return x;
            }
        }
        // rounding left the total mass a hair below the draw
        self.domain()[self.len() - 1]
    }

    /// `n` independent draws.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<Outcome> {
        (0..n).map(|_| self.pick(rng)).collect()
    }
}
