use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::ops::Neg;

use super::variable::{DiscreteRandomVariable, DIVISION_PRECISION};
use crate::error::LatticeError;
use crate::types::{Outcome, Probability};
use crate::LatticeResult;

// ---------------------------------------------------------------------------
// Operand
// ---------------------------------------------------------------------------

/// Right-hand side of an arithmetic operation.
///
/// A scalar is applied pointwise to every outcome; a variable is treated as
/// independent of the left-hand side and combined over the joint support.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Scalar(Decimal),
    Variable(&'a DiscreteRandomVariable),
}

impl From<Decimal> for Operand<'_> {
    fn from(value: Decimal) -> Self {
        Operand::Scalar(value)
    }
}

impl From<i64> for Operand<'_> {
    fn from(value: i64) -> Self {
        Operand::Scalar(Decimal::from(value))
    }
}

impl<'a> From<&'a DiscreteRandomVariable> for Operand<'a> {
    fn from(value: &'a DiscreteRandomVariable) -> Self {
        Operand::Variable(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }

    fn apply(self, a: Decimal, b: Decimal) -> LatticeResult<Decimal> {
        let value = match self {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
        };
        value.ok_or_else(|| LatticeError::ArithmeticOverflow {
            context: format!("{a} {} {b}", self.symbol()),
        })
    }
}

// ---------------------------------------------------------------------------
// Decimal helpers
// ---------------------------------------------------------------------------

/// Integer power by squaring; `None` on overflow.
pub(crate) fn checked_pow(base: Decimal, exp: u64) -> Option<Decimal> {
    let mut result = Decimal::ONE;
    let mut b = base;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = result.checked_mul(b)?;
        }
        e >>= 1;
        if e > 0 {
            b = b.checked_mul(b)?;
        }
    }
    Some(result)
}

/// Smallest magnitude distinguishable from zero at `precision` places.
fn rounding_tolerance(precision: u32) -> Decimal {
    Decimal::new(1, precision)
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

impl DiscreteRandomVariable {
    pub fn add<'a>(&self, other: impl Into<Operand<'a>>) -> LatticeResult<Self> {
        self.combine(BinaryOp::Add, other.into())
    }

    pub fn subtract<'a>(&self, other: impl Into<Operand<'a>>) -> LatticeResult<Self> {
        self.combine(BinaryOp::Sub, other.into())
    }

    /// A scalar factor below the rounding tolerance yields the constant zero.
    pub fn multiply<'a>(&self, other: impl Into<Operand<'a>>) -> LatticeResult<Self> {
        let other = other.into();
        if let Operand::Scalar(c) = other {
            if c.abs() < rounding_tolerance(self.precision()) {
                return Ok(Self::constant_named(
                    Decimal::ZERO,
                    format!("{}*{c}", self.name()),
                    self.precision(),
                ));
            }
        }
        self.combine(BinaryOp::Mul, other)
    }

    /// Division is refused whenever the divisor can take the value zero, even
    /// with zero probability.
    pub fn divide<'a>(&self, other: impl Into<Operand<'a>>) -> LatticeResult<Self> {
        let other = other.into();
        match other {
            Operand::Scalar(c) if c.is_zero() => {
                return Err(LatticeError::DivisionByZero {
                    context: format!("{} / 0", self.name()),
                });
            }
            Operand::Variable(v) if v.domain().iter().any(|x| x.is_zero()) => {
                return Err(LatticeError::DivisionByZero {
                    context: format!("{} / {}: divisor support contains 0", self.name(), v.name()),
                });
            }
            _ => {}
        }
        self.combine(BinaryOp::Div, other)
    }

    /// `X^k` for a non-negative integer `k`.
    pub fn power(&self, exponent: i64) -> LatticeResult<Self> {
        if exponent < 0 {
            return Err(LatticeError::InvalidExponent(exponent));
        }
        match exponent {
            0 => Ok(Self::constant_named(
                Decimal::ONE,
                format!("{}^0", self.name()),
                self.precision(),
            )),
            1 => self.copy(None),
            k => {
                let k = k.unsigned_abs();
                self.pushforward(format!("{}^{k}", self.name()), self.precision(), |x| {
                    checked_pow(x, k).ok_or_else(|| LatticeError::ArithmeticOverflow {
                        context: format!("{x}^{k}"),
                    })
                })
            }
        }
    }

    /// Distribution of `f(X)`: images that coincide after rounding are merged.
    pub fn transform(&self, f: impl Fn(Outcome) -> Outcome) -> Self {
        self.map_outcomes(format!("f({})", self.name()), f)
    }

    /// Like [`transform`](Self::transform) for a fallible `f`; the first error aborts.
    pub fn try_transform(
        &self,
        f: impl Fn(Outcome) -> LatticeResult<Outcome>,
    ) -> LatticeResult<Self> {
        self.pushforward(format!("f({})", self.name()), self.precision(), f)
    }

    fn combine(&self, op: BinaryOp, other: Operand<'_>) -> LatticeResult<Self> {
        match other {
            Operand::Scalar(c) => self.pushforward(
                format!("{}{}{c}", self.name(), op.symbol()),
                self.precision(),
                |x| op.apply(x, c),
            ),
            Operand::Variable(v) => self.convolve(op, v),
        }
    }

    /// Cross-product convolution of two independent variables under `op`.
    fn convolve(&self, op: BinaryOp, other: &Self) -> LatticeResult<Self> {
        let mut precision = self.precision().max(other.precision());
        if op == BinaryOp::Div {
            precision = precision.max(DIVISION_PRECISION);
        }

        let mut merged: BTreeMap<Outcome, Probability> = BTreeMap::new();
        for (a, pa) in self.iter() {
            for (b, pb) in other.iter() {
                let value = op.apply(a, b)?.round_dp(precision);
                *merged.entry(value).or_insert(Decimal::ZERO) += pa * pb;
            }
        }

        tracing::trace!(
            op = %op.symbol(),
            lhs = self.len(),
            rhs = other.len(),
            merged = merged.len(),
            "convolved random variables"
        );

        let name = format!("{}{}{}", self.name(), op.symbol(), other.name());
        Ok(Self::from_merged(merged, name, precision))
    }

    fn map_outcomes(&self, name: String, f: impl Fn(Outcome) -> Outcome) -> Self {
        match self.pushforward(name, self.precision(), |x| Ok::<_, Infallible>(f(x))) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Push the mass of every outcome through `f`, summing coincident images.
    fn pushforward<E>(
        &self,
        name: String,
        precision: u32,
        f: impl Fn(Outcome) -> Result<Outcome, E>,
    ) -> Result<Self, E> {
        let mut merged: BTreeMap<Outcome, Probability> = BTreeMap::new();
        for (x, p) in self.iter() {
            let image = f(x)?.round_dp(precision);
            *merged.entry(image).or_insert(Decimal::ZERO) += p;
        }
        Ok(Self::from_merged(merged, name, precision))
    }
}

impl Neg for &DiscreteRandomVariable {
    type Output = DiscreteRandomVariable;

    fn neg(self) -> DiscreteRandomVariable {
        self.map_outcomes(format!("-{}", self.name()), |x| -x)
    }
}
