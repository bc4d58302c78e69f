//! Ledger errors

use crate::loan::LoanState;
use flashpool_core::LoanId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Loan not found: {0}")]
    NotFound(LoanId),

    #[error("Invalid transition for {loan_id}: {from} -> {to}")]
    InvalidTransition {
        loan_id: LoanId,
        from: LoanState,
        to: LoanState,
    },

    /// The loan already reached a terminal state. Duplicate repay/default
    /// attempts land here, which makes both idempotent.
    #[error("Loan {loan_id} already finalized as {state}")]
    AlreadyFinalized { loan_id: LoanId, state: LoanState },
}

impl LedgerError {
    /// Benign idempotence signal rather than a failure
    pub fn is_already_finalized(&self) -> bool {
        matches!(self, LedgerError::AlreadyFinalized { .. })
    }
}
