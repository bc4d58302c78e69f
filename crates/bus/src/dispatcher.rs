//! Background delivery of outbound work to collaborators
//!
//! Callers enqueue with [`CollaboratorBus::publish`], which never blocks.
//! A single dispatcher task drains the queue in order and retries each
//! collaborator call independently.

use crate::collaborator::Collaborators;
use crate::error::BusError;
use crate::event::Outbound;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Retry settings for collaborator delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Total attempts per collaborator call, including the first
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

enum Envelope {
    Deliver(Outbound),
    Flush(oneshot::Sender<()>),
}

/// Handle for enqueueing work to the dispatcher
#[derive(Clone)]
pub struct CollaboratorBus {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl CollaboratorBus {
    /// Start the dispatcher task on the current tokio runtime
    pub fn spawn(collaborators: Collaborators, policy: DeliveryPolicy) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(receiver, collaborators, policy));
        (Self { sender }, handle)
    }

    /// Enqueue work without waiting for delivery
    pub fn publish(&self, item: Outbound) -> Result<(), BusError> {
        self.sender
            .send(Envelope::Deliver(item))
            .map_err(|_| BusError::ChannelClosed)
    }

    /// Wait until everything enqueued before this call has been delivered
    /// (or has exhausted its retries).
    pub async fn flush(&self) -> Result<(), BusError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Envelope::Flush(tx))
            .map_err(|_| BusError::ChannelClosed)?;
        rx.await.map_err(|_| BusError::ChannelClosed)
    }
}

async fn run(
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
    collaborators: Collaborators,
    policy: DeliveryPolicy,
) {
    while let Some(envelope) = receiver.recv().await {
        match envelope {
            Envelope::Deliver(item) => deliver(&collaborators, &item, policy).await,
            Envelope::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Collaborator bus closed");
}

async fn deliver(collaborators: &Collaborators, item: &Outbound, policy: DeliveryPolicy) {
    match item {
        Outbound::PersistLoan(loan) => {
            for store in &collaborators.loan_stores {
                with_retry(store.name(), item.kind(), policy, || store.persist_loan(loan)).await;
            }
        }
        Outbound::PersistPool(pool) => {
            for store in &collaborators.pool_stores {
                with_retry(store.name(), item.kind(), policy, || {
                    store.persist_pool_state(pool)
                })
                .await;
            }
        }
        Outbound::Notify(event) => {
            for notifier in &collaborators.notifiers {
                with_retry(notifier.name(), item.kind(), policy, || notifier.notify(event)).await;
            }
        }
    }
}

/// Returns true if the call eventually succeeded
async fn with_retry<F, Fut>(name: &str, kind: &str, policy: DeliveryPolicy, mut call: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), BusError>>,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match call().await {
            Ok(()) => return true,
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    collaborator = name,
                    kind,
                    attempt,
                    error = %e,
                    "Delivery failed, retrying"
                );
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    collaborator = name,
                    kind,
                    attempts,
                    error = %e,
                    "Delivery failed, giving up"
                );
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LoanEvent;
    use crate::memory::MemoryCollaborator;
    use flashpool_core::{Amount, LoanId};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> DeliveryPolicy {
        DeliveryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    fn refund_event() -> Outbound {
        Outbound::Notify(LoanEvent::refund_due(LoanId::new(1), "alice", Amount::new(3)))
    }

    fn collaborators(memory: &Arc<MemoryCollaborator>) -> Collaborators {
        Collaborators::new()
            .with_loan_store(memory.clone())
            .with_pool_store(memory.clone())
            .with_notifier(memory.clone())
    }

    #[tokio::test]
    async fn test_publish_then_flush_delivers() {
        let memory = Arc::new(MemoryCollaborator::new());
        let (bus, _handle) = CollaboratorBus::spawn(collaborators(&memory), fast_policy(3));

        bus.publish(refund_event()).unwrap();
        bus.flush().await.unwrap();

        assert_eq!(memory.events().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let memory = Arc::new(MemoryCollaborator::new());
        memory.fail_next(2);
        let (bus, _handle) = CollaboratorBus::spawn(collaborators(&memory), fast_policy(3));

        bus.publish(refund_event()).unwrap();
        bus.flush().await.unwrap();

        assert_eq!(memory.events().len(), 1);
        assert_eq!(memory.failures(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_give_up() {
        let memory = Arc::new(MemoryCollaborator::new());
        memory.fail_next(5);
        let (bus, _handle) = CollaboratorBus::spawn(collaborators(&memory), fast_policy(2));

        bus.publish(refund_event()).unwrap();
        bus.flush().await.unwrap();

        assert!(memory.events().is_empty());
        assert_eq!(memory.failures(), 2);
    }

    #[tokio::test]
    async fn test_publish_after_dispatcher_stops() {
        let memory = Arc::new(MemoryCollaborator::new());
        let (bus, handle) = CollaboratorBus::spawn(collaborators(&memory), fast_policy(1));
        handle.abort();
        let _ = handle.await;

        let result = bus.publish(refund_event());
        assert!(matches!(result, Err(BusError::ChannelClosed)));
    }
}
