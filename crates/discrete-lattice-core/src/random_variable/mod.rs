mod algebra;
mod moments;
mod variable;

pub use algebra::Operand;
pub use variable::{
    DiscreteRandomVariable, DEFAULT_NAME, DEFAULT_PRECISION, DISPLAY_DECIMALS,
    DIVISION_PRECISION, MAX_PRECISION, TOLERANCE,
};

pub(crate) use algebra::checked_pow;
