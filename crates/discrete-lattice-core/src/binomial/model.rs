use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LatticeError;
use crate::random_variable::{checked_pow, DiscreteRandomVariable};
use crate::types::{OptionType, Price, Probability, Rate};
use crate::LatticeResult;

/// Decimal places kept on lattice prices and accepted on the move factors.
pub const PRICE_PRECISION: u32 = 10;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Scalar parameters of a recombining binomial tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinomialModelParams {
    pub spot_price: Price,
    /// Multiplicative up move (u)
    pub up_factor: Decimal,
    /// Multiplicative down move (d)
    pub down_factor: Decimal,
    /// Real-world weight of the up move (normalised with `down_probability`)
    pub up_probability: Decimal,
    pub down_probability: Decimal,
    /// Per-period risk-free rate
    pub risk_free_rate: Rate,
    #[serde(default = "default_periods")]
    pub periods: u32,
}

fn default_periods() -> u32 {
    1
}

impl BinomialModelParams {
    pub fn build(&self) -> LatticeResult<BinomialModel> {
        BinomialModel::new(
            self.spot_price,
            self.up_factor,
            self.down_factor,
            self.up_probability,
            self.down_probability,
            self.risk_free_rate,
            self.periods,
        )
    }
}

/// Shares and bond holding that reproduce the option value one step ahead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicatingPortfolio {
    pub shares: Decimal,
    pub bond: Decimal,
}

/// Recombining binomial asset-price model.
///
/// Each period the price moves by `u` or `d`. Real-world weights drive path
/// simulation; valuation uses the risk-neutral weights
/// `π_u = (1 + r - d) / (u - d)`, `π_d = (u - 1 - r) / (u - d)`.
#[derive(Debug, Clone)]
pub struct BinomialModel {
    s0: Price,
    u: Decimal,
    d: Decimal,
    rate: Rate,
    periods: u32,
    increment: DiscreteRandomVariable,
    risk_neutral: (Probability, Probability),
    increment_risk_neutral: DiscreteRandomVariable,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_params(s0: Price, u: Decimal, d: Decimal, rate: Rate) -> LatticeResult<()> {
    if s0 <= Decimal::ZERO {
        return Err(LatticeError::InvalidInput {
            field: "s0".into(),
            reason: "must be positive".into(),
        });
    }
    if d <= Decimal::ZERO {
        return Err(LatticeError::InvalidInput {
            field: "d".into(),
            reason: "must be positive".into(),
        });
    }
    if u <= d {
        return Err(LatticeError::InvalidInput {
            field: "u".into(),
            reason: "up factor must exceed down factor".into(),
        });
    }
    // the increments store u and d at PRICE_PRECISION; π must price those exact values
    for (field, factor) in [("u", u), ("d", d)] {
        if factor.normalize().scale() > PRICE_PRECISION {
            return Err(LatticeError::InvalidInput {
                field: field.into(),
                reason: format!("at most {PRICE_PRECISION} decimal places"),
            });
        }
    }
    let growth = Decimal::ONE + rate;
    if !(d < growth && growth < u) {
        return Err(LatticeError::ArbitrageViolation {
            down: d,
            growth,
            up: u,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Construction and accessors
// ---------------------------------------------------------------------------

impl BinomialModel {
    pub fn new(
        s0: Price,
        u: Decimal,
        d: Decimal,
        p: Decimal,
        q: Decimal,
        rate: Rate,
        periods: u32,
    ) -> LatticeResult<Self> {
        validate_params(s0, u, d, rate)?;

        let increment =
            DiscreteRandomVariable::with_precision(&[u, d], Some(&[p, q]), "R", PRICE_PRECISION)?;

        let spread = u - d;
        let growth = Decimal::ONE + rate;
        let pi_u = (growth - d) / spread;
        let pi_d = (u - growth) / spread;
        let increment_risk_neutral = DiscreteRandomVariable::with_precision(
            &[u, d],
            Some(&[pi_u, pi_d]),
            "R*",
            PRICE_PRECISION,
        )?;

        tracing::debug!(
            %s0, %u, %d, %rate, periods,
            pi_u = %pi_u, pi_d = %pi_d,
            "built binomial model"
        );

        Ok(Self {
            s0,
            u,
            d,
            rate,
            periods,
            increment,
            risk_neutral: (pi_u, pi_d),
            increment_risk_neutral,
        })
    }

    pub fn s0(&self) -> Price {
        self.s0
    }

    pub fn up_factor(&self) -> Decimal {
        self.u
    }

    pub fn down_factor(&self) -> Decimal {
        self.d
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn periods(&self) -> u32 {
        self.periods
    }

    /// One-period price ratio under the real-world measure.
    pub fn increment(&self) -> &DiscreteRandomVariable {
        &self.increment
    }

    /// One-period price ratio under the risk-neutral measure.
    pub fn increment_risk_neutral(&self) -> &DiscreteRandomVariable {
        &self.increment_risk_neutral
    }

    /// `(π_u, π_d)`
    pub fn risk_neutral(&self) -> (Probability, Probability) {
        self.risk_neutral
    }

    /// Same tree rooted at `s0` with `periods` steps, keeping the real-world weights.
    fn sub_model(&self, s0: Price, periods: u32) -> LatticeResult<Self> {
        Self::new(
            s0,
            self.u,
            self.d,
            self.increment.probability_of(self.u),
            self.increment.probability_of(self.d),
            self.rate,
            periods,
        )
    }

    fn compounding(&self) -> LatticeResult<Decimal> {
        let growth = Decimal::ONE + self.rate;
        let factor = checked_pow(growth, u64::from(self.periods)).ok_or_else(|| {
            LatticeError::ArithmeticOverflow {
                context: format!("(1 + {})^{}", self.rate, self.periods),
            }
        })?;
        if factor.is_zero() {
            return Err(LatticeError::DivisionByZero {
                context: "discount factor".into(),
            });
        }
        Ok(factor)
    }

    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    /// One simulated price path of `periods + 1` prices under the real-world
    /// measure, starting at `s0`.
    ///
    /// Each price is the node reached by the up moves drawn so far, so a path
    /// always lands on a node of [`terminal_distribution_real_world`](Self::terminal_distribution_real_world).
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> LatticeResult<Vec<Price>> {
        let mut path = Vec::with_capacity(self.periods as usize + 1);
        path.push(self.s0);
        let mut ups = 0;
        for step in 1..=self.periods {
            if self.increment.pick(rng) == self.u {
                ups += 1;
            }
            path.push(self.node_price(ups, step - ups)?);
        }
        Ok(path)
    }

    // -----------------------------------------------------------------------
    // Distributions
    // -----------------------------------------------------------------------

    /// `{s0} * R * ... * R` over `periods` steps.
    ///
    /// The number of up moves is built by convolving one {0, 1} indicator per
    /// period and then pushed forward to `s0·u^k·d^(n-k)`. Node prices depend
    /// only on `k`, so every path with the same number of up moves merges into
    /// one of the `periods + 1` nodes.
    fn iterate_increment(
        &self,
        increment: &DiscreteRandomVariable,
    ) -> LatticeResult<DiscreteRandomVariable> {
        let mut up_move = increment.transform(|r| {
            if r == self.u {
                Decimal::ONE
            } else {
                Decimal::ZERO
            }
        });
        up_move.rename("U")?;
        let mut ups =
            DiscreteRandomVariable::with_precision(&[Decimal::ZERO], None, "N", PRICE_PRECISION)?;
        for _ in 0..self.periods {
            ups = ups.add(&up_move)?;
        }

        let mut terminal = ups.try_transform(|k| {
            let k = k.to_u32().ok_or_else(|| LatticeError::ArithmeticOverflow {
                context: format!("up-move count {k}"),
            })?;
            self.node_price(k, self.periods - k)
        })?;
        terminal.rename("S_T")?;
        Ok(terminal)
    }

    /// Terminal price distribution under the risk-neutral measure, with
    /// `periods + 1` outcomes.
    pub fn terminal_distribution(&self) -> LatticeResult<DiscreteRandomVariable> {
        self.iterate_increment(&self.increment_risk_neutral)
    }

    /// Terminal price distribution under the real-world measure.
    pub fn terminal_distribution_real_world(&self) -> LatticeResult<DiscreteRandomVariable> {
        self.iterate_increment(&self.increment)
    }

    // -----------------------------------------------------------------------
    // Valuation
    // -----------------------------------------------------------------------

    /// Discounted risk-neutral expectation of the option payoff at expiry.
    pub fn european_option_evaluate(
        &self,
        option_type: OptionType,
        strike: Price,
    ) -> LatticeResult<Price> {
        let terminal = self.terminal_distribution()?;
        let payoff = terminal.transform(|x| option_type.payoff(x, strike));
        let value = payoff
            .expectation()?
            .checked_div(self.compounding()?)
            .ok_or_else(|| LatticeError::ArithmeticOverflow {
                context: "discounting option value".into(),
            })?;

        tracing::debug!(
            ?option_type,
            %strike,
            periods = self.periods,
            nodes = terminal.len(),
            %value,
            "evaluated european option"
        );
        Ok(value)
    }

    /// Backward induction over the recombining tree.
    ///
    /// Independent of the random-variable algebra; used to cross-check
    /// [`european_option_evaluate`](Self::european_option_evaluate).
    pub fn european_option_evaluate_lattice(
        &self,
        option_type: OptionType,
        strike: Price,
    ) -> LatticeResult<Price> {
        let n = self.periods;
        let (pi_u, pi_d) = self.risk_neutral;
        let growth = Decimal::ONE + self.rate;

        let mut values = (0..=n)
            .map(|ups| Ok(option_type.payoff(self.node_price(ups, n - ups)?, strike)))
            .collect::<LatticeResult<Vec<Price>>>()?;

        for step in (0..n as usize).rev() {
            for i in 0..=step {
                values[i] = pi_u
                    .checked_mul(values[i + 1])
                    .zip(pi_d.checked_mul(values[i]))
                    .and_then(|(up, down)| up.checked_add(down))
                    .and_then(|v| v.checked_div(growth))
                    .ok_or_else(|| LatticeError::ArithmeticOverflow {
                        context: format!("backward induction at step {step}"),
                    })?;
            }
        }
        Ok(values[0])
    }

    /// Price at the node reached by `ups` up moves and `downs` down moves.
    fn node_price(&self, ups: u32, downs: u32) -> LatticeResult<Price> {
        let overflow = || LatticeError::ArithmeticOverflow {
            context: format!("node price u^{ups} d^{downs}"),
        };
        let up = checked_pow(self.u, u64::from(ups)).ok_or_else(overflow)?;
        let down = checked_pow(self.d, u64::from(downs)).ok_or_else(overflow)?;
        self.s0
            .checked_mul(up)
            .and_then(|v| v.checked_mul(down))
            .ok_or_else(overflow)
    }

    /// One-step hedge ratio `(V_up - V_down) / ((u - d) · s0)`.
    ///
    /// Undefined for an expired option, so a zero-period model is rejected.
    pub fn delta(&self, option_type: OptionType, strike: Price) -> LatticeResult<Decimal> {
        if self.periods == 0 {
            return Err(LatticeError::PreconditionViolation(
                "delta requires at least one period to expiry".into(),
            ));
        }
        let overflow = || LatticeError::ArithmeticOverflow {
            context: "delta".into(),
        };
        let up = self.sub_model(self.node_price(1, 0)?, self.periods - 1)?;
        let down = self.sub_model(self.node_price(0, 1)?, self.periods - 1)?;
        let v_up = up.european_option_evaluate(option_type, strike)?;
        let v_down = down.european_option_evaluate(option_type, strike)?;
        let spread = (self.u - self.d).checked_mul(self.s0).ok_or_else(overflow)?;
        v_up.checked_sub(v_down)
            .and_then(|dv| dv.checked_div(spread))
            .ok_or_else(overflow)
    }

    /// Shares and bond that replicate the option over the first period.
    pub fn replicating_portfolio(
        &self,
        option_type: OptionType,
        strike: Price,
    ) -> LatticeResult<ReplicatingPortfolio> {
        let shares = self.delta(option_type, strike)?;
        let value = self.european_option_evaluate(option_type, strike)?;
        let bond = shares
            .checked_mul(self.s0)
            .and_then(|held| value.checked_sub(held))
            .ok_or_else(|| LatticeError::ArithmeticOverflow {
                context: "replicating bond position".into(),
            })?;
        Ok(ReplicatingPortfolio { shares, bond })
    }
}
