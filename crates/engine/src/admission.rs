//! Admission controller
//!
//! Validates a loan request, prices it, reserves the principal in the pool
//! and records the loan as executed. Everything that can fail without side
//! effects runs before the reservation, so a rejected request leaves the
//! pool and the ledger untouched.

use crate::error::EngineError;
use crate::publish::publish_all;
use crate::scheduler::ExpiryScheduler;
use crate::settlement::SettlementProcessor;
use chrono::{DateTime, TimeDelta, Utc};
use flashpool_bus::{CollaboratorBus, LoanEvent, Outbound};
use flashpool_core::{math, Amount, Chain, LoanId, PoolId};
use flashpool_ledger::{LoanDraft, LoanLedger, LoanState};
use flashpool_pool::PoolRegistry;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// What the borrower gets back from a successful admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionReceipt {
    pub loan_id: LoanId,
    pub pool_id: PoolId,
    pub fee: Amount,
    /// `principal + fee`, the exact amount that settles the loan
    pub repayment_due: Amount,
    pub expires_at: DateTime<Utc>,
    pub reference: String,
}

pub struct AdmissionController {
    registry: Arc<PoolRegistry>,
    ledger: Arc<LoanLedger>,
    scheduler: Arc<ExpiryScheduler>,
    settlement: Arc<SettlementProcessor>,
    bus: CollaboratorBus,
    max_duration_secs: u64,
}

impl AdmissionController {
    pub fn new(
        registry: Arc<PoolRegistry>,
        ledger: Arc<LoanLedger>,
        scheduler: Arc<ExpiryScheduler>,
        settlement: Arc<SettlementProcessor>,
        bus: CollaboratorBus,
        max_duration_secs: u64,
    ) -> Self {
        Self {
            registry,
            ledger,
            scheduler,
            settlement,
            bus,
            max_duration_secs,
        }
    }

    pub fn request_loan(
        &self,
        pool_id: PoolId,
        principal: Amount,
        duration_secs: u64,
        borrower: &str,
    ) -> Result<AdmissionReceipt, EngineError> {
        self.try_admit(pool_id, principal, duration_secs, borrower)
            .map_err(|e| {
                tracing::warn!(
                    pool_id = %pool_id,
                    principal = %principal,
                    borrower,
                    error = %e,
                    "Loan request rejected"
                );
                publish_all(
                    &self.bus,
                    [Outbound::Notify(LoanEvent::rejected(
                        "request_loan",
                        Some(pool_id),
                        None,
                        Some(borrower.to_string()),
                        e.to_string(),
                    ))],
                );
                e
            })
    }

    fn try_admit(
        &self,
        pool_id: PoolId,
        principal: Amount,
        duration_secs: u64,
        borrower: &str,
    ) -> Result<AdmissionReceipt, EngineError> {
        let borrower = borrower.trim();
        if borrower.is_empty() {
            return Err(EngineError::validation("borrower must not be blank"));
        }
        if principal.is_zero() {
            return Err(EngineError::validation("principal must be positive"));
        }
        if duration_secs == 0 {
            return Err(EngineError::validation("duration must be positive"));
        }
        if duration_secs > self.max_duration_secs {
            return Err(EngineError::validation(format!(
                "duration {}s exceeds maximum {}s",
                duration_secs, self.max_duration_secs
            )));
        }

        let pool = self.registry.snapshot(pool_id)?;
        let fee = math::fee(principal, pool.fee_rate)?;
        let repayment_due = math::repayment_due(principal, fee)?;

        let created_at = Utc::now();
        let expires_at = i64::try_from(duration_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|d| created_at.checked_add_signed(d))
            .ok_or_else(|| EngineError::validation("duration out of range"))?;

        self.registry.reserve(pool_id, principal)?;

        let view = self.ledger.commit(LoanDraft {
            pool_id,
            chain: pool.chain.clone(),
            token: pool.token.clone(),
            borrower: borrower.to_string(),
            principal,
            fee,
            created_at,
            expires_at,
            reference: new_reference(&pool.chain, created_at),
        });
        let loan_id = view.id();

        self.scheduler
            .schedule(loan_id, expires_at, Arc::clone(&self.settlement));

        tracing::debug!(
            loan_id = %loan_id,
            pool_id = %pool_id,
            principal = %principal,
            fee = %fee,
            %expires_at,
            "Loan admitted"
        );

        let mut outbound = vec![
            Outbound::Notify(LoanEvent::status_changed(&view, LoanState::Pending)),
            Outbound::PersistLoan(view.clone()),
        ];
        if let Ok(pool) = self.registry.snapshot(pool_id) {
            outbound.push(Outbound::PersistPool(pool));
        }
        publish_all(&self.bus, outbound);

        Ok(AdmissionReceipt {
            loan_id,
            pool_id,
            fee,
            repayment_due,
            expires_at,
            reference: view.loan.reference,
        })
    }
}

/// `<chain>_<unix-millis>_<random>`
fn new_reference(chain: &Chain, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        chain,
        at.timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let at = Utc::now();
        let reference = new_reference(&Chain::Ton, at);
        let parts: Vec<&str> = reference.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ton");
        assert_eq!(parts[1], at.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 32);
    }
}
