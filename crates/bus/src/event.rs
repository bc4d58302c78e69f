//! Events handed to collaborators

use chrono::{DateTime, Utc};
use flashpool_core::{Amount, LoanId, PoolId};
use flashpool_ledger::{LoanState, LoanView};
use flashpool_pool::Pool;
use serde::{Deserialize, Serialize};

/// Observable loan lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoanEvent {
    /// A loan moved between lifecycle states
    StatusChanged {
        loan_id: LoanId,
        pool_id: PoolId,
        old: LoanState,
        new: LoanState,
        at: DateTime<Utc>,
    },

    /// An admission or repayment was refused
    Rejected {
        operation: String,
        pool_id: Option<PoolId>,
        loan_id: Option<LoanId>,
        borrower: Option<String>,
        reason: String,
        at: DateTime<Utc>,
    },

    /// A repayment exceeded the amount due and the excess must go back
    RefundDue {
        loan_id: LoanId,
        borrower: String,
        amount: Amount,
        at: DateTime<Utc>,
    },
}

impl LoanEvent {
    pub fn status_changed(loan: &LoanView, old: LoanState) -> Self {
        Self::StatusChanged {
            loan_id: loan.loan.id,
            pool_id: loan.loan.pool_id,
            old,
            new: loan.state,
            at: loan.finalized_at.unwrap_or(loan.loan.created_at),
        }
    }

    pub fn rejected(
        operation: impl Into<String>,
        pool_id: Option<PoolId>,
        loan_id: Option<LoanId>,
        borrower: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            operation: operation.into(),
            pool_id,
            loan_id,
            borrower,
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    pub fn refund_due(loan_id: LoanId, borrower: impl Into<String>, amount: Amount) -> Self {
        Self::RefundDue {
            loan_id,
            borrower: borrower.into(),
            amount,
            at: Utc::now(),
        }
    }
}

/// Work item for the dispatcher
#[derive(Debug, Clone)]
pub enum Outbound {
    PersistLoan(LoanView),
    PersistPool(Pool),
    Notify(LoanEvent),
}

impl Outbound {
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::PersistLoan(_) => "persist_loan",
            Outbound::PersistPool(_) => "persist_pool_state",
            Outbound::Notify(_) => "notify",
        }
    }
}
