//! Settlement processor: the repayment and default paths

use crate::config::OverpaymentPolicy;
use crate::error::EngineError;
use crate::publish::publish_all;
use crate::scheduler::ExpiryScheduler;
use chrono::{DateTime, Utc};
use flashpool_bus::{CollaboratorBus, LoanEvent, Outbound};
use flashpool_core::{Amount, LoanId};
use flashpool_ledger::{LedgerError, LoanLedger, LoanState, LoanView};
use flashpool_pool::{PoolRegistry, PoolState};
use serde::Serialize;
use std::sync::Arc;

/// Result of a successful repayment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepayReceipt {
    pub loan_id: LoanId,
    /// `principal + fee`
    pub amount_due: Amount,
    pub amount_paid: Amount,
    /// Excess over `amount_due`, non-zero only under the refund policy
    pub refund: Amount,
    pub repaid_at: DateTime<Utc>,
    pub pool_state: PoolState,
}

pub struct SettlementProcessor {
    registry: Arc<PoolRegistry>,
    ledger: Arc<LoanLedger>,
    scheduler: Arc<ExpiryScheduler>,
    bus: CollaboratorBus,
    overpayment: OverpaymentPolicy,
}

impl SettlementProcessor {
    pub fn new(
        registry: Arc<PoolRegistry>,
        ledger: Arc<LoanLedger>,
        scheduler: Arc<ExpiryScheduler>,
        bus: CollaboratorBus,
        overpayment: OverpaymentPolicy,
    ) -> Self {
        Self {
            registry,
            ledger,
            scheduler,
            bus,
            overpayment,
        }
    }

    /// Settle a loan with `principal + fee`.
    ///
    /// Rejections are returned to the caller and also reported to the
    /// notifier as `Rejected` events. A duplicate settlement of a finalized
    /// loan is only logged.
    pub fn repay(
        &self,
        loan_id: LoanId,
        amount_paid: Amount,
        now: DateTime<Utc>,
    ) -> Result<RepayReceipt, EngineError> {
        let result = self.try_repay(loan_id, None, amount_paid, now);
        self.report(loan_id, None, amount_paid, result)
    }

    /// Like [`repay`](Self::repay), but only the loan's own borrower may
    /// settle it. Anyone else gets `Unauthorized` and nothing changes.
    pub fn repay_as(
        &self,
        loan_id: LoanId,
        borrower: &str,
        amount_paid: Amount,
        now: DateTime<Utc>,
    ) -> Result<RepayReceipt, EngineError> {
        let result = self.try_repay(loan_id, Some(borrower), amount_paid, now);
        self.report(loan_id, Some(borrower), amount_paid, result)
    }

    fn report(
        &self,
        loan_id: LoanId,
        caller: Option<&str>,
        amount_paid: Amount,
        result: Result<RepayReceipt, EngineError>,
    ) -> Result<RepayReceipt, EngineError> {
        result.map_err(|e| {
            if e.is_benign() {
                tracing::debug!(loan_id = %loan_id, error = %e, "Duplicate repayment");
                return e;
            }

            tracing::warn!(
                loan_id = %loan_id,
                amount_paid = %amount_paid,
                error = %e,
                "Repayment rejected"
            );
            let (pool_id, borrower) = match self.ledger.get(loan_id) {
                Ok(view) => (Some(view.loan.pool_id), Some(view.loan.borrower)),
                Err(_) => (None, None),
            };
            publish_all(
                &self.bus,
                [Outbound::Notify(LoanEvent::rejected(
                    "repay",
                    pool_id,
                    Some(loan_id),
                    caller.map(str::to_string).or(borrower),
                    e.to_string(),
                ))],
            );
            e
        })
    }

    fn try_repay(
        &self,
        loan_id: LoanId,
        caller: Option<&str>,
        amount_paid: Amount,
        now: DateTime<Utc>,
    ) -> Result<RepayReceipt, EngineError> {
        let view = self.ledger.get(loan_id)?;
        if let Some(caller) = caller {
            if caller.trim() != view.loan.borrower {
                return Err(EngineError::Unauthorized {
                    loan_id,
                    caller: caller.to_string(),
                });
            }
        }
        ensure_executed(&view)?;

        let amount_due = view.loan.repayment_due()?;
        if amount_paid < amount_due {
            return Err(EngineError::InsufficientPayment {
                loan_id,
                required: amount_due,
                paid: amount_paid,
            });
        }

        let refund = amount_paid.saturating_sub(amount_due);
        if !refund.is_zero() && self.overpayment == OverpaymentPolicy::Reject {
            return Err(EngineError::ExcessPayment {
                loan_id,
                required: amount_due,
                paid: amount_paid,
            });
        }

        let repaid = self
            .ledger
            .transition(loan_id, LoanState::Executed, LoanState::Repaid, now)?;
        self.scheduler.cancel(loan_id);

        // The loan is already Repaid here; a failed settle leaves the pool
        // out of step with the ledger.
        let pool_state = self
            .registry
            .settle(view.loan.pool_id, view.loan.principal, view.loan.fee)
            .map_err(|e| {
                tracing::error!(
                    loan_id = %loan_id,
                    pool_id = %view.loan.pool_id,
                    error = %e,
                    "Loan marked repaid but pool settlement failed"
                );
                EngineError::from(e)
            })?;

        tracing::debug!(
            loan_id = %loan_id,
            pool_id = %view.loan.pool_id,
            amount_paid = %amount_paid,
            fee = %view.loan.fee,
            "Loan repaid"
        );

        let mut outbound = vec![
            Outbound::Notify(LoanEvent::status_changed(&repaid, LoanState::Executed)),
            Outbound::PersistLoan(repaid.clone()),
        ];
        if let Ok(pool) = self.registry.snapshot(view.loan.pool_id) {
            outbound.push(Outbound::PersistPool(pool));
        }
        if !refund.is_zero() {
            tracing::info!(loan_id = %loan_id, refund = %refund, "Overpayment to refund");
            outbound.push(Outbound::Notify(LoanEvent::refund_due(
                loan_id,
                view.loan.borrower.clone(),
                refund,
            )));
        }
        publish_all(&self.bus, outbound);

        Ok(RepayReceipt {
            loan_id,
            amount_due,
            amount_paid,
            refund,
            repaid_at: repaid.finalized_at.unwrap_or(now),
            pool_state,
        })
    }

    /// Default an unpaid loan whose deadline has passed. The principal
    /// returns to the pool and the fee is forfeited.
    pub fn expire_default(
        &self,
        loan_id: LoanId,
        now: DateTime<Utc>,
    ) -> Result<LoanView, EngineError> {
        let view = self.ledger.get(loan_id)?;
        ensure_executed(&view)?;

        if !view.loan.is_expired_at(now) {
            return Err(EngineError::NotYetExpired {
                loan_id,
                expires_at: view.loan.expires_at,
            });
        }

        let defaulted = self
            .ledger
            .transition(loan_id, LoanState::Executed, LoanState::Defaulted, now)?;
        self.scheduler.cancel(loan_id);

        self.registry
            .release(view.loan.pool_id, view.loan.principal)
            .map_err(|e| {
                tracing::error!(
                    loan_id = %loan_id,
                    pool_id = %view.loan.pool_id,
                    error = %e,
                    "Loan marked defaulted but principal release failed"
                );
                EngineError::from(e)
            })?;

        tracing::info!(
            loan_id = %loan_id,
            pool_id = %view.loan.pool_id,
            principal = %view.loan.principal,
            "Loan defaulted"
        );

        let mut outbound = vec![
            Outbound::Notify(LoanEvent::status_changed(&defaulted, LoanState::Executed)),
            Outbound::PersistLoan(defaulted.clone()),
        ];
        if let Ok(pool) = self.registry.snapshot(view.loan.pool_id) {
            outbound.push(Outbound::PersistPool(pool));
        }
        publish_all(&self.bus, outbound);

        Ok(defaulted)
    }
}

fn ensure_executed(view: &LoanView) -> Result<(), EngineError> {
    if view.state.is_terminal() {
        return Err(LedgerError::AlreadyFinalized {
            loan_id: view.id(),
            state: view.state,
        }
        .into());
    }
    Ok(())
}
