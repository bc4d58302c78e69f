//! Engine facade

use crate::admission::{AdmissionController, AdmissionReceipt};
use crate::config::{ConfigLoader, EngineConfig};
use crate::error::EngineError;
use crate::publish::publish_all;
use crate::scheduler::ExpiryScheduler;
use crate::settlement::{RepayReceipt, SettlementProcessor};
use chrono::Utc;
use flashpool_bus::{CollaboratorBus, Collaborators, Outbound};
use flashpool_core::{Amount, Chain, LoanId, PoolId};
use flashpool_ledger::{LoanLedger, LoanView};
use flashpool_pool::{Pool, PoolRegistry, PoolSpec, PoolState};
use std::sync::Arc;
use tokio::runtime::Handle;

/// The flash-loan core: pools, loans, deadlines and collaborator delivery,
/// built once and shared by reference.
///
/// Must be created inside a tokio runtime; deadlines and collaborator
/// delivery run as tasks on that runtime.
pub struct FlashLoanEngine {
    config: EngineConfig,
    registry: Arc<PoolRegistry>,
    ledger: Arc<LoanLedger>,
    scheduler: Arc<ExpiryScheduler>,
    settlement: Arc<SettlementProcessor>,
    admission: AdmissionController,
    bus: CollaboratorBus,
}

impl FlashLoanEngine {
    /// Build the engine and create the configured seed pools
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        ConfigLoader::validate(&config).map_err(|e| EngineError::validation(e.to_string()))?;

        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let (bus, _dispatcher) = CollaboratorBus::spawn(collaborators, config.delivery_policy());
        let registry = Arc::new(PoolRegistry::new());
        let ledger = Arc::new(LoanLedger::new());
        let scheduler = Arc::new(ExpiryScheduler::new(runtime.clone()));
        let settlement = Arc::new(SettlementProcessor::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            Arc::clone(&scheduler),
            bus.clone(),
            config.overpayment,
        ));
        let admission = AdmissionController::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            Arc::clone(&scheduler),
            Arc::clone(&settlement),
            bus.clone(),
            config.max_duration_secs,
        );

        let engine = Self {
            config,
            registry,
            ledger,
            scheduler,
            settlement,
            admission,
            bus,
        };

        for spec in engine.config.pools.clone() {
            engine.create_pool(spec)?;
        }

        tracing::info!(
            pools = engine.registry.len(),
            max_duration_secs = engine.config.max_duration_secs,
            overpayment = ?engine.config.overpayment,
            "Flash loan engine started"
        );

        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_pool(&self, spec: PoolSpec) -> Result<PoolId, EngineError> {
        let pool_id = self.registry.create(spec)?;
        self.persist_pool(pool_id)?;
        Ok(pool_id)
    }

    /// Add provider liquidity to a pool
    pub fn deposit(&self, pool_id: PoolId, amount: Amount) -> Result<PoolState, EngineError> {
        let state = self.registry.deposit(pool_id, amount)?;
        self.persist_pool(pool_id)?;
        Ok(state)
    }

    pub fn request_loan(
        &self,
        pool_id: PoolId,
        principal: Amount,
        duration_secs: u64,
        borrower: &str,
    ) -> Result<AdmissionReceipt, EngineError> {
        self.admission
            .request_loan(pool_id, principal, duration_secs, borrower)
    }

    pub fn repay(&self, loan_id: LoanId, amount_paid: Amount) -> Result<RepayReceipt, EngineError> {
        self.settlement.repay(loan_id, amount_paid, Utc::now())
    }

    /// Repay on behalf of `borrower`, refusing loans owned by anyone else
    pub fn repay_as(
        &self,
        loan_id: LoanId,
        borrower: &str,
        amount_paid: Amount,
    ) -> Result<RepayReceipt, EngineError> {
        self.settlement
            .repay_as(loan_id, borrower, amount_paid, Utc::now())
    }

    /// Default every executed loan whose deadline has passed without
    /// waiting for its timer.
    pub fn sweep_expired(&self) -> Vec<LoanId> {
        let now = Utc::now();
        self.ledger
            .executed()
            .into_iter()
            .filter(|view| view.loan.is_expired_at(now))
            .filter_map(|view| match self.settlement.expire_default(view.id(), now) {
                Ok(defaulted) => Some(defaulted),
                Err(e) => {
                    if !e.is_benign() {
                        tracing::error!(
                            loan_id = %view.id(),
                            error = %e,
                            "Sweep failed to default loan"
                        );
                    }
                    None
                }
            })
            .map(|view| view.id())
            .collect()
    }

    pub fn get_loan(&self, loan_id: LoanId) -> Result<LoanView, EngineError> {
        Ok(self.ledger.get(loan_id)?)
    }

    pub fn pool_state(&self, pool_id: PoolId) -> Result<PoolState, EngineError> {
        Ok(self.registry.state(pool_id)?)
    }

    pub fn pool(&self, pool_id: PoolId) -> Result<Pool, EngineError> {
        Ok(self.registry.snapshot(pool_id)?)
    }

    pub fn list_pools(&self, chain: Option<&Chain>) -> Vec<Pool> {
        self.registry.list(chain)
    }

    /// Loan history of a borrower, newest first
    pub fn loans_by_borrower(&self, borrower: &str, chain: Option<&Chain>) -> Vec<LoanView> {
        self.ledger.by_borrower(borrower, chain)
    }

    pub fn active_loans(&self) -> usize {
        self.ledger.active_count()
    }

    pub fn pending_deadlines(&self) -> usize {
        self.scheduler.pending_count()
    }

    /// Wait until collaborator work enqueued so far has been delivered
    pub async fn flush(&self) {
        if let Err(e) = self.bus.flush().await {
            tracing::warn!(error = %e, "Collaborator flush failed");
        }
    }

    /// Disarm all deadlines and drain collaborator work. Loans still
    /// executed stay executed.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown();
        self.flush().await;
        tracing::info!(active_loans = self.ledger.active_count(), "Flash loan engine stopped");
    }

    fn persist_pool(&self, pool_id: PoolId) -> Result<(), EngineError> {
        let pool = self.registry.snapshot(pool_id)?;
        publish_all(&self.bus, [Outbound::PersistPool(pool)]);
        Ok(())
    }
}
