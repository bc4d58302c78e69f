//! Engine errors

use chrono::{DateTime, Utc};
use flashpool_core::{Amount, LoanId, MathError};
use flashpool_ledger::LedgerError;
use flashpool_pool::PoolError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed input, no state change
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error("Insufficient payment for {loan_id}: required {required}, paid {paid}")]
    InsufficientPayment {
        loan_id: LoanId,
        required: Amount,
        paid: Amount,
    },

    #[error("Excess payment for {loan_id}: required {required}, paid {paid}")]
    ExcessPayment {
        loan_id: LoanId,
        required: Amount,
        paid: Amount,
    },

    #[error("Loan {loan_id} does not belong to {caller}")]
    Unauthorized { loan_id: LoanId, caller: String },

    #[error("Loan {loan_id} not expired until {expires_at}")]
    NotYetExpired {
        loan_id: LoanId,
        expires_at: DateTime<Utc>,
    },

    #[error("No tokio runtime available")]
    NoRuntime,
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// The caller may retry with different input (smaller principal,
    /// larger payment) or later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Pool(PoolError::InsufficientLiquidity { .. })
                | EngineError::Pool(PoolError::RatioExceeded { .. })
                | EngineError::InsufficientPayment { .. }
                | EngineError::NotYetExpired { .. }
        )
    }

    /// Duplicate repay/default on a finalized loan
    pub fn is_benign(&self) -> bool {
        matches!(self, EngineError::Ledger(e) if e.is_already_finalized())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::Pool(PoolError::NotFound(_)) | EngineError::Ledger(LedgerError::NotFound(_))
        )
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, EngineError::Pool(PoolError::InvariantViolation { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashpool_core::PoolId;
    use flashpool_ledger::LoanState;

    #[test]
    fn test_classification() {
        let finalized = EngineError::from(LedgerError::AlreadyFinalized {
            loan_id: LoanId::new(1),
            state: LoanState::Repaid,
        });
        assert!(finalized.is_benign());
        assert!(!finalized.is_retryable());

        let ratio = EngineError::from(PoolError::RatioExceeded {
            pool_id: PoolId::new(1),
            reserved: Amount::new(500),
            requested: Amount::new(400),
            max_loanable: Amount::new(800),
        });
        assert!(ratio.is_retryable());
        assert!(!ratio.is_benign());

        assert!(EngineError::from(PoolError::NotFound(PoolId::new(9))).is_not_found());
        assert!(!EngineError::validation("bad").is_retryable());

        let foreign = EngineError::Unauthorized {
            loan_id: LoanId::new(1),
            caller: "bob".to_string(),
        };
        assert!(!foreign.is_retryable());
        assert!(!foreign.is_benign());
        assert_eq!(foreign.to_string(), "Loan LOAN-1 does not belong to bob");
    }
}
