//! Amount - Token quantity in the smallest on-chain unit
//!
//! Amounts are unsigned integers, so negative balances are unrepresentable.
//! Arithmetic is always checked; callers decide how to surface overflow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A token quantity expressed in the token's smallest unit
/// (e.g. 1 EOS = 10_000 units at precision 4).
///
/// # Example
/// ```
/// use flashpool_core::Amount;
///
/// let a = Amount::new(500);
/// let b = Amount::new(300);
/// assert_eq!(a.checked_add(b), Some(Amount::new(800)));
///
/// // Subtraction never goes below zero
/// assert!(b.checked_sub(a).is_none());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Zero amount constant
    pub const ZERO: Self = Self(0);

    /// Largest representable amount
    pub const MAX: Self = Self(u64::MAX);

    #[inline]
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Raw number of smallest units
    #[inline]
    pub const fn units(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition - returns None on overflow
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction - returns None if the result would be negative
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}
