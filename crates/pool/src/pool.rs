//! Pool records
//!
//! A pool is split into immutable terms (chain, token, rates) and a small
//! block of mutable counters guarded by the pool's own mutex.

use chrono::{DateTime, Utc};
use flashpool_core::{math, Amount, Bps, Chain, MathError, PoolId, Token};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Parameters for creating a pool (seed/admin operation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub chain: Chain,
    pub token: Token,
    /// On-chain pool address, informational only
    #[serde(default)]
    pub address: Option<String>,
    pub total_liquidity: Amount,
    #[serde(rename = "fee_rate_bps")]
    pub fee_rate: Bps,
    #[serde(rename = "max_loan_ratio_bps")]
    pub max_loan_ratio: Bps,
}

impl PoolSpec {
    pub fn new(
        chain: Chain,
        token: Token,
        total_liquidity: Amount,
        fee_rate: Bps,
        max_loan_ratio: Bps,
    ) -> Self {
        Self {
            chain,
            token,
            address: None,
            total_liquidity,
            fee_rate,
            max_loan_ratio,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// Capacity counters of a pool, as exposed by `listPoolState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub total_liquidity: Amount,
    pub reserved_liquidity: Amount,
}

impl PoolState {
    /// Liquidity not currently reserved by an active loan
    pub fn available(&self) -> Amount {
        self.total_liquidity.saturating_sub(self.reserved_liquidity)
    }
}

/// Point-in-time copy of a pool, taken under the pool lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub chain: Chain,
    pub token: Token,
    pub address: Option<String>,
    pub total_liquidity: Amount,
    pub reserved_liquidity: Amount,
    pub fee_rate: Bps,
    pub max_loan_ratio: Bps,
    /// Lifetime fees accrued into `total_liquidity`
    pub fees_earned: Amount,
    /// Loans currently holding a reservation
    pub active_loans: u64,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    pub fn state(&self) -> PoolState {
        PoolState {
            total_liquidity: self.total_liquidity,
            reserved_liquidity: self.reserved_liquidity,
        }
    }

    pub fn max_loanable(&self) -> Result<Amount, MathError> {
        math::max_loanable(self.total_liquidity, self.max_loan_ratio)
    }
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) total_liquidity: Amount,
    pub(crate) reserved_liquidity: Amount,
    pub(crate) fees_earned: Amount,
    pub(crate) active_loans: u64,
}

/// Registry slot for one pool
#[derive(Debug)]
pub(crate) struct PoolCell {
    pub(crate) id: PoolId,
    pub(crate) chain: Chain,
    pub(crate) token: Token,
    pub(crate) address: Option<String>,
    pub(crate) fee_rate: Bps,
    pub(crate) max_loan_ratio: Bps,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) counters: Mutex<PoolCounters>,
}

impl PoolCell {
    pub(crate) fn new(id: PoolId, spec: PoolSpec) -> Self {
        Self {
            id,
            chain: spec.chain,
            token: spec.token,
            address: spec.address,
            fee_rate: spec.fee_rate,
            max_loan_ratio: spec.max_loan_ratio,
            created_at: Utc::now(),
            counters: Mutex::new(PoolCounters {
                total_liquidity: spec.total_liquidity,
                ..PoolCounters::default()
            }),
        }
    }

    /// Build a snapshot from counters the caller already holds locked
    pub(crate) fn snapshot_with(&self, counters: &PoolCounters) -> Pool {
        Pool {
            id: self.id,
            chain: self.chain.clone(),
            token: self.token.clone(),
            address: self.address.clone(),
            total_liquidity: counters.total_liquidity,
            reserved_liquidity: counters.reserved_liquidity,
            fee_rate: self.fee_rate,
            max_loan_ratio: self.max_loan_ratio,
            fees_earned: counters.fees_earned,
            active_loans: counters.active_loans,
            created_at: self.created_at,
        }
    }

    pub(crate) fn snapshot(&self) -> Pool {
        let counters = self.counters.lock();
        self.snapshot_with(&counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PoolSpec {
        PoolSpec::new(
            Chain::Eos,
            "EOS".parse().unwrap(),
            Amount::new(1_000),
            Bps::new(10).unwrap(),
            Bps::new(8_000).unwrap(),
        )
    }

    #[test]
    fn test_snapshot_reflects_spec() {
        let cell = PoolCell::new(PoolId::new(1), spec().with_address("flashloan.eos"));
        let pool = cell.snapshot();

        assert_eq!(pool.total_liquidity, Amount::new(1_000));
        assert_eq!(pool.reserved_liquidity, Amount::ZERO);
        assert_eq!(pool.address.as_deref(), Some("flashloan.eos"));
        assert_eq!(pool.max_loanable().unwrap(), Amount::new(800));
    }

    #[test]
    fn test_state_available() {
        let state = PoolState {
            total_liquidity: Amount::new(1_000),
            reserved_liquidity: Amount::new(300),
        };
        assert_eq!(state.available(), Amount::new(700));
    }

    #[test]
    fn test_spec_deserializes_from_config_shape() {
        let json = r#"{
            "chain": "ton",
            "token": "ton",
            "total_liquidity": 50000,
            "fee_rate_bps": 9,
            "max_loan_ratio_bps": 5000
        }"#;
        let spec: PoolSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.chain, Chain::Ton);
        assert_eq!(spec.token.symbol(), "TON");
        assert_eq!(spec.fee_rate.get(), 9);
        assert!(spec.address.is_none());
    }

    #[test]
    fn test_spec_rejects_zero_ratio() {
        let json = r#"{
            "chain": "sui",
            "token": "SUI",
            "total_liquidity": 1,
            "fee_rate_bps": 9,
            "max_loan_ratio_bps": 0
        }"#;
        assert!(serde_json::from_str::<PoolSpec>(json).is_err());
    }
}
