//! Fee & ratio calculator
//!
//! Pure functions shared by admission, settlement and tests. Products are
//! computed in `u128` (twice the width of `Amount`) and narrowed back with a
//! checked conversion, so nothing is ever silently truncated.

use crate::amount::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Basis-point denominator: 10_000 bps = 100%
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Errors from fee/ratio arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Basis points must be within 1..=10000, got {0}")]
    InvalidBps(u32),
}

/// A rate in basis points, always within `1..=10_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Bps(u16);

impl Bps {
    /// 100%
    pub const MAX: Self = Self(10_000);

    pub fn new(value: u32) -> Result<Self, MathError> {
        if value == 0 || value > BPS_DENOMINATOR {
            return Err(MathError::InvalidBps(value));
        }
        Ok(Self(value as u16))
    }

    #[inline]
    pub const fn get(&self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for Bps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

impl TryFrom<u32> for Bps {
    type Error = MathError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Bps> for u32 {
    fn from(bps: Bps) -> Self {
        bps.get()
    }
}

/// Multiply a value by basis points: floor(value * bps / 10_000)
fn bps_mul(value: Amount, bps: Bps, op: &'static str) -> Result<Amount, MathError> {
    let wide = (value.units() as u128)
        .checked_mul(bps.get() as u128)
        .ok_or(MathError::ArithmeticOverflow(op))?
        / BPS_DENOMINATOR as u128;

    u64::try_from(wide)
        .map(Amount::new)
        .map_err(|_| MathError::ArithmeticOverflow(op))
}

/// Flat flash-loan fee: `floor(principal * fee_rate / 10_000)`.
///
/// ```
/// use flashpool_core::{math, Amount, Bps};
///
/// let fee = math::fee(Amount::new(1_000_000), Bps::new(9).unwrap()).unwrap();
/// assert_eq!(fee, Amount::new(900));
///
/// // Sub-unit fees floor to zero
/// let dust = math::fee(Amount::new(500), Bps::new(10).unwrap()).unwrap();
/// assert_eq!(dust, Amount::ZERO);
/// ```
pub fn fee(principal: Amount, fee_rate: Bps) -> Result<Amount, MathError> {
    bps_mul(principal, fee_rate, "fee")
}

/// Admission bound of a pool: `floor(total_liquidity * max_loan_ratio / 10_000)`.
pub fn max_loanable(total_liquidity: Amount, max_loan_ratio: Bps) -> Result<Amount, MathError> {
    bps_mul(total_liquidity, max_loan_ratio, "max_loanable")
}

/// Amount a borrower must pay back: `principal + fee`.
pub fn repayment_due(principal: Amount, fee: Amount) -> Result<Amount, MathError> {
    principal
        .checked_add(fee)
        .ok_or(MathError::ArithmeticOverflow("repayment_due"))
}
