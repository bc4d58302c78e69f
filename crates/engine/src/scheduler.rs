//! Expiry scheduler
//!
//! Each executed loan gets one background task that sleeps until the loan's
//! deadline and then drives the default path. Repayment cancels the task.
//! A repayment racing a firing deadline is settled by the ledger's
//! single-winner transition; the loser sees `AlreadyFinalized` and the
//! task treats that as done.

use crate::error::EngineError;
use crate::settlement::SettlementProcessor;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use flashpool_core::LoanId;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub struct ExpiryScheduler {
    runtime: Handle,
    timers: Arc<DashMap<LoanId, JoinHandle<()>>>,
}

impl ExpiryScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            timers: Arc::new(DashMap::new()),
        }
    }

    /// Arm the deadline of a loan. A loan already armed keeps its timer.
    pub fn schedule(
        &self,
        loan_id: LoanId,
        expires_at: DateTime<Utc>,
        settlement: Arc<SettlementProcessor>,
    ) {
        // The entry guard is held across the spawn so the task cannot
        // remove its slot before the handle is stored.
        match self.timers.entry(loan_id) {
            Entry::Occupied(_) => {
                tracing::debug!(loan_id = %loan_id, "Deadline already armed");
            }
            Entry::Vacant(slot) => {
                let timers = Arc::clone(&self.timers);
                let handle = self
                    .runtime
                    .spawn(run_deadline(loan_id, expires_at, settlement, timers));
                slot.insert(handle);
                tracing::debug!(loan_id = %loan_id, %expires_at, "Deadline armed");
            }
        }
    }

    /// Disarm a loan's deadline. Returns false if none was pending.
    pub fn cancel(&self, loan_id: LoanId) -> bool {
        match self.timers.remove(&loan_id) {
            Some((_, handle)) => {
                handle.abort();
                tracing::debug!(loan_id = %loan_id, "Deadline cancelled");
                true
            }
            None => false,
        }
    }

    /// Disarm every pending deadline
    pub fn shutdown(&self) {
        let mut cancelled = 0usize;
        self.timers.retain(|_, handle| {
            handle.abort();
            cancelled += 1;
            false
        });
        tracing::info!(cancelled, "Expiry scheduler stopped");
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    pub fn is_pending(&self, loan_id: LoanId) -> bool {
        self.timers.contains_key(&loan_id)
    }
}

async fn run_deadline(
    loan_id: LoanId,
    expires_at: DateTime<Utc>,
    settlement: Arc<SettlementProcessor>,
    timers: Arc<DashMap<LoanId, JoinHandle<()>>>,
) {
    loop {
        if let Ok(remaining) = (expires_at - Utc::now()).to_std() {
            tokio::time::sleep(remaining).await;
        }

        match settlement.expire_default(loan_id, Utc::now()) {
            Ok(_) => break,
            // Woke up a hair early, sleep for the remainder
            Err(EngineError::NotYetExpired { .. }) => continue,
            Err(e) if e.is_benign() => {
                tracing::debug!(loan_id = %loan_id, "Loan settled before its deadline");
                break;
            }
            Err(e) => {
                tracing::error!(loan_id = %loan_id, error = %e, "Default path failed");
                break;
            }
        }
    }

    timers.remove(&loan_id);
}
