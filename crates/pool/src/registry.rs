//! Pool registry implementation

use crate::error::PoolError;
use crate::pool::{Pool, PoolCell, PoolSpec, PoolState};
use dashmap::DashMap;
use flashpool_core::{math, Amount, Chain, MathError, PoolId, Token};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Registry of all liquidity pools
///
/// The pool table is a sharded concurrent map; a lookup clones the pool's
/// `Arc` and releases the shard before the pool mutex is taken, so no
/// table-wide lock is ever held across a reservation check.
#[derive(Debug)]
pub struct PoolRegistry {
    pools: DashMap<PoolId, Arc<PoolCell>>,
    next_id: AtomicU64,
    /// Serializes pool creation so the one-pool-per-chain/token rule holds
    create_lock: Mutex<()>,
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
            next_id: AtomicU64::new(1),
            create_lock: Mutex::new(()),
        }
    }

    /// Create a new pool and return its id
    pub fn create(&self, spec: PoolSpec) -> Result<PoolId, PoolError> {
        let _guard = self.create_lock.lock();

        if let Some(existing) = self.find(&spec.chain, &spec.token) {
            return Err(PoolError::AlreadyExists {
                chain: spec.chain,
                token: spec.token,
                existing,
            });
        }

        let id = PoolId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        tracing::info!(
            pool_id = %id,
            chain = %spec.chain,
            token = %spec.token,
            total_liquidity = %spec.total_liquidity,
            fee_rate = %spec.fee_rate,
            max_loan_ratio = %spec.max_loan_ratio,
            "Pool created"
        );
        self.pools.insert(id, Arc::new(PoolCell::new(id, spec)));

        Ok(id)
    }

    /// Find the pool serving a chain/token pair
    pub fn find(&self, chain: &Chain, token: &Token) -> Option<PoolId> {
        self.pools
            .iter()
            .find(|entry| entry.chain == *chain && entry.token == *token)
            .map(|entry| *entry.key())
    }

    fn cell(&self, pool_id: PoolId) -> Result<Arc<PoolCell>, PoolError> {
        self.pools
            .get(&pool_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(PoolError::NotFound(pool_id))
    }

    /// Atomically reserve `amount` of a pool's liquidity.
    ///
    /// Succeeds only if `reserved + amount` stays within both the pool's
    /// total liquidity and its max-loanable bound. Returns the pool state
    /// right after the reservation.
    pub fn reserve(&self, pool_id: PoolId, amount: Amount) -> Result<PoolState, PoolError> {
        if amount.is_zero() {
            return Err(PoolError::InvalidAmount("reservation must be positive"));
        }

        let cell = self.cell(pool_id)?;
        let mut counters = cell.counters.lock();

        let requested_total = counters
            .reserved_liquidity
            .checked_add(amount)
            .ok_or(PoolError::Math(MathError::ArithmeticOverflow("reserve")))?;

        if requested_total > counters.total_liquidity {
            return Err(PoolError::InsufficientLiquidity {
                pool_id,
                available: counters
                    .total_liquidity
                    .saturating_sub(counters.reserved_liquidity),
                requested: amount,
            });
        }

        let max_loanable = math::max_loanable(counters.total_liquidity, cell.max_loan_ratio)?;
        if requested_total > max_loanable {
            return Err(PoolError::RatioExceeded {
                pool_id,
                reserved: counters.reserved_liquidity,
                requested: amount,
                max_loanable,
            });
        }

        counters.reserved_liquidity = requested_total;
        counters.active_loans += 1;

        tracing::debug!(
            pool_id = %pool_id,
            amount = %amount,
            reserved = %counters.reserved_liquidity,
            "Liquidity reserved"
        );

        Ok(PoolState {
            total_liquidity: counters.total_liquidity,
            reserved_liquidity: counters.reserved_liquidity,
        })
    }

    /// Return a reservation to the pool.
    ///
    /// Releasing more than is reserved means the loan/pool bookkeeping is
    /// already corrupt; this is reported as `InvariantViolation` and the
    /// counters are left untouched.
    pub fn release(&self, pool_id: PoolId, amount: Amount) -> Result<PoolState, PoolError> {
        let cell = self.cell(pool_id)?;
        let mut counters = cell.counters.lock();

        let Some(reserved) = counters.reserved_liquidity.checked_sub(amount) else {
            let reason = format!(
                "release of {} exceeds reserved {}",
                amount, counters.reserved_liquidity
            );
            tracing::error!(pool_id = %pool_id, %reason, "Pool invariant violated");
            return Err(PoolError::InvariantViolation { pool_id, reason });
        };

        counters.reserved_liquidity = reserved;
        counters.active_loans = counters.active_loans.saturating_sub(1);

        tracing::debug!(
            pool_id = %pool_id,
            amount = %amount,
            reserved = %counters.reserved_liquidity,
            "Liquidity released"
        );

        Ok(PoolState {
            total_liquidity: counters.total_liquidity,
            reserved_liquidity: counters.reserved_liquidity,
        })
    }

    /// Release a repaid principal and accrue its fee in one critical
    /// section, so readers never see the release without the fee.
    pub fn settle(
        &self,
        pool_id: PoolId,
        principal: Amount,
        fee: Amount,
    ) -> Result<PoolState, PoolError> {
        let cell = self.cell(pool_id)?;
        let mut counters = cell.counters.lock();

        let Some(reserved) = counters.reserved_liquidity.checked_sub(principal) else {
            let reason = format!(
                "settlement of {} exceeds reserved {}",
                principal, counters.reserved_liquidity
            );
            tracing::error!(pool_id = %pool_id, %reason, "Pool invariant violated");
            return Err(PoolError::InvariantViolation { pool_id, reason });
        };

        let overflow = || PoolError::Math(MathError::ArithmeticOverflow("settle"));
        let total = counters.total_liquidity.checked_add(fee).ok_or_else(overflow)?;
        let earned = counters.fees_earned.checked_add(fee).ok_or_else(overflow)?;

        counters.reserved_liquidity = reserved;
        counters.total_liquidity = total;
        counters.fees_earned = earned;
        counters.active_loans = counters.active_loans.saturating_sub(1);

        tracing::debug!(
            pool_id = %pool_id,
            principal = %principal,
            fee = %fee,
            reserved = %reserved,
            total = %total,
            "Repayment settled"
        );

        Ok(PoolState {
            total_liquidity: total,
            reserved_liquidity: reserved,
        })
    }

    /// Grow pool capacity by a realized fee
    pub fn accrue_fee(&self, pool_id: PoolId, fee: Amount) -> Result<PoolState, PoolError> {
        let cell = self.cell(pool_id)?;
        let mut counters = cell.counters.lock();

        let overflow = || PoolError::Math(MathError::ArithmeticOverflow("accrue_fee"));
        let total = counters.total_liquidity.checked_add(fee).ok_or_else(overflow)?;
        let earned = counters.fees_earned.checked_add(fee).ok_or_else(overflow)?;

        counters.total_liquidity = total;
        counters.fees_earned = earned;

        tracing::debug!(pool_id = %pool_id, fee = %fee, total = %total, "Fee accrued");

        Ok(PoolState {
            total_liquidity: counters.total_liquidity,
            reserved_liquidity: counters.reserved_liquidity,
        })
    }

    /// Liquidity provider deposit into an existing pool
    pub fn deposit(&self, pool_id: PoolId, amount: Amount) -> Result<PoolState, PoolError> {
        if amount.is_zero() {
            return Err(PoolError::InvalidAmount("deposit must be positive"));
        }

        let cell = self.cell(pool_id)?;
        let mut counters = cell.counters.lock();

        counters.total_liquidity = counters
            .total_liquidity
            .checked_add(amount)
            .ok_or(PoolError::Math(MathError::ArithmeticOverflow("deposit")))?;

        tracing::info!(
            pool_id = %pool_id,
            amount = %amount,
            total = %counters.total_liquidity,
            "Liquidity deposited"
        );

        Ok(PoolState {
            total_liquidity: counters.total_liquidity,
            reserved_liquidity: counters.reserved_liquidity,
        })
    }

    /// Consistent copy of one pool
    pub fn snapshot(&self, pool_id: PoolId) -> Result<Pool, PoolError> {
        Ok(self.cell(pool_id)?.snapshot())
    }

    /// Capacity counters of one pool
    pub fn state(&self, pool_id: PoolId) -> Result<PoolState, PoolError> {
        Ok(self.snapshot(pool_id)?.state())
    }

    /// All pools, optionally restricted to one chain, ordered by id
    pub fn list(&self, chain: Option<&Chain>) -> Vec<Pool> {
        let cells: Vec<Arc<PoolCell>> = self
            .pools
            .iter()
            .filter(|entry| chain.map_or(true, |c| entry.chain == *c))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut pools: Vec<Pool> = cells.iter().map(|cell| cell.snapshot()).collect();
        pools.sort_by_key(|p| p.id);
        pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashpool_core::Bps;
    use std::thread;

    fn spec(chain: Chain, token: &str, total: u64) -> PoolSpec {
        PoolSpec::new(
            chain,
            token.parse().unwrap(),
            Amount::new(total),
            Bps::new(10).unwrap(),
            Bps::new(8_000).unwrap(),
        )
    }

    fn registry_with_pool(total: u64) -> (PoolRegistry, PoolId) {
        let registry = PoolRegistry::new();
        let id = registry.create(spec(Chain::Eos, "EOS", total)).unwrap();
        (registry, id)
    }

    #[test]
    fn test_ids_are_sequential() {
        let registry = PoolRegistry::new();
        let a = registry.create(spec(Chain::Eos, "EOS", 1)).unwrap();
        let b = registry.create(spec(Chain::Ton, "TON", 1)).unwrap();
        assert_eq!(a, PoolId::new(1));
        assert_eq!(b, PoolId::new(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_chain_token_rejected() {
        let registry = PoolRegistry::new();
        let first = registry.create(spec(Chain::Sui, "SUI", 10)).unwrap();
        let result = registry.create(spec(Chain::Sui, "sui", 99));
        assert_eq!(
            result,
            Err(PoolError::AlreadyExists {
                chain: Chain::Sui,
                token: "SUI".parse().unwrap(),
                existing: first,
            })
        );
    }

    #[test]
    fn test_reserve_within_bound() {
        let (registry, id) = registry_with_pool(1_000);
        let state = registry.reserve(id, Amount::new(500)).unwrap();
        assert_eq!(state.reserved_liquidity, Amount::new(500));
        assert_eq!(registry.snapshot(id).unwrap().active_loans, 1);
    }

    #[test]
    fn test_reserve_ratio_exceeded_leaves_state() {
        let (registry, id) = registry_with_pool(1_000);
        registry.reserve(id, Amount::new(500)).unwrap();

        let result = registry.reserve(id, Amount::new(400));
        assert!(matches!(result, Err(PoolError::RatioExceeded { .. })));
        assert_eq!(registry.state(id).unwrap().reserved_liquidity, Amount::new(500));
    }

    #[test]
    fn test_reserve_beyond_total_is_insufficient_liquidity() {
        let (registry, id) = registry_with_pool(1_000);
        let result = registry.reserve(id, Amount::new(1_200));
        assert!(matches!(
            result,
            Err(PoolError::InsufficientLiquidity { available, .. }) if available == Amount::new(1_000)
        ));
    }

    #[test]
    fn test_reserve_unknown_pool() {
        let registry = PoolRegistry::new();
        assert_eq!(
            registry.reserve(PoolId::new(9), Amount::new(1)),
            Err(PoolError::NotFound(PoolId::new(9)))
        );
    }

    #[test]
    fn test_reserve_zero_rejected() {
        let (registry, id) = registry_with_pool(1_000);
        assert!(matches!(
            registry.reserve(id, Amount::ZERO),
            Err(PoolError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_release_underflow_is_invariant_violation() {
        let (registry, id) = registry_with_pool(1_000);
        registry.reserve(id, Amount::new(100)).unwrap();

        let result = registry.release(id, Amount::new(101));
        assert!(matches!(result, Err(PoolError::InvariantViolation { .. })));
        assert_eq!(registry.state(id).unwrap().reserved_liquidity, Amount::new(100));
    }

    #[test]
    fn test_accrue_fee_raises_headroom() {
        let (registry, id) = registry_with_pool(1_000);
        registry.reserve(id, Amount::new(800)).unwrap();
        assert!(registry.reserve(id, Amount::new(8)).is_err());

        registry.accrue_fee(id, Amount::new(10)).unwrap();
        // max loanable is now floor(1010 * 0.8) = 808
        assert!(registry.reserve(id, Amount::new(8)).is_ok());

        let pool = registry.snapshot(id).unwrap();
        assert_eq!(pool.total_liquidity, Amount::new(1_010));
        assert_eq!(pool.fees_earned, Amount::new(10));
    }

    #[test]
    fn test_settle_releases_and_accrues() {
        let (registry, id) = registry_with_pool(1_000);
        registry.reserve(id, Amount::new(500)).unwrap();

        let state = registry.settle(id, Amount::new(500), Amount::new(3)).unwrap();
        assert_eq!(state.reserved_liquidity, Amount::ZERO);
        assert_eq!(state.total_liquidity, Amount::new(1_003));

        let pool = registry.snapshot(id).unwrap();
        assert_eq!(pool.fees_earned, Amount::new(3));
        assert_eq!(pool.active_loans, 0);
    }

    #[test]
    fn test_settle_underflow_changes_nothing() {
        let (registry, id) = registry_with_pool(1_000);
        let result = registry.settle(id, Amount::new(1), Amount::new(3));
        assert!(matches!(result, Err(PoolError::InvariantViolation { .. })));
        assert_eq!(registry.state(id).unwrap().total_liquidity, Amount::new(1_000));
    }

    #[test]
    fn test_deposit_grows_total() {
        let (registry, id) = registry_with_pool(1_000);
        let state = registry.deposit(id, Amount::new(250)).unwrap();
        assert_eq!(state.total_liquidity, Amount::new(1_250));
        assert_eq!(registry.snapshot(id).unwrap().fees_earned, Amount::ZERO);
    }

    #[test]
    fn test_list_filters_by_chain() {
        let registry = PoolRegistry::new();
        registry.create(spec(Chain::Eos, "EOS", 1)).unwrap();
        registry.create(spec(Chain::Ton, "TON", 1)).unwrap();
        registry.create(spec(Chain::Ton, "USDT", 1)).unwrap();

        assert_eq!(registry.list(None).len(), 3);
        let ton = registry.list(Some(&Chain::Ton));
        assert_eq!(ton.len(), 2);
        assert!(ton[0].id < ton[1].id);
    }

    #[test]
    fn test_concurrent_reserves_never_oversell() {
        let (registry, id) = registry_with_pool(1_000);
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.reserve(id, Amount::new(75)).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count() as u64;

        // floor(800 / 75) = 10
        assert_eq!(admitted, 10);
        assert_eq!(
            registry.state(id).unwrap().reserved_liquidity,
            Amount::new(admitted * 75)
        );
    }
}
