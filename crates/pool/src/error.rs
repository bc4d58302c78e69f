//! Pool registry errors

use flashpool_core::{Amount, Chain, MathError, PoolId, Token};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool not found: {0}")]
    NotFound(PoolId),

    #[error("Pool already exists for {chain}/{token}: {existing}")]
    AlreadyExists {
        chain: Chain,
        token: Token,
        existing: PoolId,
    },

    #[error("Insufficient liquidity in {pool_id}: available {available}, requested {requested}")]
    InsufficientLiquidity {
        pool_id: PoolId,
        available: Amount,
        requested: Amount,
    },

    #[error("Loan ratio exceeded in {pool_id}: reserved {reserved} + requested {requested} > max loanable {max_loanable}")]
    RatioExceeded {
        pool_id: PoolId,
        reserved: Amount,
        requested: Amount,
        max_loanable: Amount,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error("Pool invariant violated in {pool_id}: {reason}")]
    InvariantViolation { pool_id: PoolId, reason: String },
}
