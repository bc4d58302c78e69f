//! FlashPool Pool Registry
//!
//! Holds every liquidity pool together with its capacity (`total_liquidity`)
//! and committed-liquidity (`reserved_liquidity`) counters.
//!
//! Each pool has its own mutex. The check-then-increment in
//! [`PoolRegistry::reserve`] runs entirely inside that critical section, so
//! concurrent borrowers can never jointly oversell a pool, while borrowers on
//! different pools never contend.

pub mod error;
pub mod pool;
pub mod registry;

pub use error::PoolError;
pub use pool::{Pool, PoolSpec, PoolState};
pub use registry::PoolRegistry;
