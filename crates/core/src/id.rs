//! Pool and loan identifiers
//!
//! Both are assigned from monotonically increasing counters, starting at 1,
//! by the registry that owns the records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }

        /// Accepts both the bare number and the prefixed display form.
        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                let digits = s
                    .strip_prefix(concat!($prefix, "-"))
                    .unwrap_or(s);
                digits.parse().map(Self)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a liquidity pool
    PoolId,
    "POOL"
);

numeric_id!(
    /// Identifier of a loan record
    LoanId,
    "LOAN"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        assert_eq!(PoolId::new(7).to_string(), "POOL-7");
        assert_eq!(LoanId::new(42).to_string(), "LOAN-42");
    }

    #[test]
    fn test_parse_both_forms() {
        assert_eq!("LOAN-42".parse::<LoanId>().unwrap(), LoanId::new(42));
        assert_eq!("42".parse::<LoanId>().unwrap(), LoanId::new(42));
        assert!("LOAN-x".parse::<LoanId>().is_err());
    }
}
