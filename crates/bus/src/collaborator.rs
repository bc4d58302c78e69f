//! Collaborator traits
//!
//! Implementations must be idempotent: a retried delivery may hand the same
//! record over more than once.

use crate::error::BusError;
use crate::event::LoanEvent;
use async_trait::async_trait;
use flashpool_ledger::LoanView;
use flashpool_pool::Pool;
use std::sync::Arc;

/// Durable storage for loan rows (`PersistLoan`)
#[async_trait]
pub trait LoanStore: Send + Sync {
    fn name(&self) -> &str;

    async fn persist_loan(&self, loan: &LoanView) -> Result<(), BusError>;
}

/// Durable storage for pool counters (`PersistPoolState`)
#[async_trait]
pub trait PoolStore: Send + Sync {
    fn name(&self) -> &str;

    async fn persist_pool_state(&self, pool: &Pool) -> Result<(), BusError>;
}

/// Observability hook (`NotifyStatusChange`)
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, event: &LoanEvent) -> Result<(), BusError>;
}

/// Notifier that writes every event to the tracing log
pub struct LogNotifier;

#[async_trait]
impl StatusNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, event: &LoanEvent) -> Result<(), BusError> {
        match event {
            LoanEvent::StatusChanged {
                loan_id, old, new, ..
            } => tracing::info!(loan_id = %loan_id, %old, %new, "Loan status changed"),
            LoanEvent::Rejected {
                operation, reason, ..
            } => tracing::info!(%operation, %reason, "Request rejected"),
            LoanEvent::RefundDue {
                loan_id, amount, ..
            } => tracing::info!(loan_id = %loan_id, amount = %amount, "Refund due"),
        }
        Ok(())
    }
}

/// The set of collaborators the dispatcher delivers to
#[derive(Default, Clone)]
pub struct Collaborators {
    pub(crate) loan_stores: Vec<Arc<dyn LoanStore>>,
    pub(crate) pool_stores: Vec<Arc<dyn PoolStore>>,
    pub(crate) notifiers: Vec<Arc<dyn StatusNotifier>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loan_store(mut self, store: Arc<dyn LoanStore>) -> Self {
        self.loan_stores.push(store);
        self
    }

    pub fn with_pool_store(mut self, store: Arc<dyn PoolStore>) -> Self {
        self.pool_stores.push(store);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn StatusNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.loan_stores.is_empty() && self.pool_stores.is_empty() && self.notifiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashpool_core::{Amount, LoanId};

    #[tokio::test]
    async fn test_log_notifier_accepts_all_events() {
        let notifier = LogNotifier;
        let event = LoanEvent::refund_due(LoanId::new(1), "alice", Amount::new(5));
        assert!(notifier.notify(&event).await.is_ok());
        assert_eq!(notifier.name(), "log");
    }

    #[test]
    fn test_empty_collaborators() {
        assert!(Collaborators::new().is_empty());
        let with_log = Collaborators::new().with_notifier(Arc::new(LogNotifier));
        assert!(!with_log.is_empty());
    }
}
