//! In-memory collaborator, used by tests and dry runs

use crate::collaborator::{LoanStore, PoolStore, StatusNotifier};
use crate::error::BusError;
use crate::event::LoanEvent;
use async_trait::async_trait;
use flashpool_core::LoanId;
use flashpool_ledger::LoanView;
use flashpool_pool::Pool;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Records everything it receives. Can be told to fail the next `n` calls.
#[derive(Default)]
pub struct MemoryCollaborator {
    loans: Mutex<Vec<LoanView>>,
    pools: Mutex<Vec<Pool>>,
    events: Mutex<Vec<LoanEvent>>,
    fail_remaining: AtomicU32,
    failures: AtomicU32,
}

impl MemoryCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls (of any kind) fail
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of calls that were failed on purpose
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn loans(&self) -> Vec<LoanView> {
        self.loans.lock().clone()
    }

    /// Latest persisted row of a loan
    pub fn latest_loan(&self, loan_id: LoanId) -> Option<LoanView> {
        self.loans
            .lock()
            .iter()
            .rev()
            .find(|l| l.id() == loan_id)
            .cloned()
    }

    pub fn pools(&self) -> Vec<Pool> {
        self.pools.lock().clone()
    }

    pub fn events(&self) -> Vec<LoanEvent> {
        self.events.lock().clone()
    }

    fn check_failure(&self) -> Result<(), BusError> {
        let failed = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(BusError::collaborator("memory", "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl LoanStore for MemoryCollaborator {
    fn name(&self) -> &str {
        "memory"
    }

    async fn persist_loan(&self, loan: &LoanView) -> Result<(), BusError> {
        self.check_failure()?;
        self.loans.lock().push(loan.clone());
        Ok(())
    }
}

#[async_trait]
impl PoolStore for MemoryCollaborator {
    fn name(&self) -> &str {
        "memory"
    }

    async fn persist_pool_state(&self, pool: &Pool) -> Result<(), BusError> {
        self.check_failure()?;
        self.pools.lock().push(pool.clone());
        Ok(())
    }
}

#[async_trait]
impl StatusNotifier for MemoryCollaborator {
    fn name(&self) -> &str {
        "memory"
    }

    async fn notify(&self, event: &LoanEvent) -> Result<(), BusError> {
        self.check_failure()?;
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashpool_core::Amount;

    #[tokio::test]
    async fn test_fail_next_counts_down() {
        let memory = MemoryCollaborator::new();
        memory.fail_next(1);
        let event = LoanEvent::refund_due(LoanId::new(1), "bob", Amount::new(1));

        assert!(memory.notify(&event).await.is_err());
        assert!(memory.notify(&event).await.is_ok());
        assert_eq!(memory.failures(), 1);
        assert_eq!(memory.events(), vec![event]);
    }
}
