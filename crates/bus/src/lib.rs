//! FlashPool Collaborator Bus
//!
//! The core never waits on durability or observability. State changes are
//! enqueued here after they commit in memory, and a background dispatcher
//! delivers them to the registered collaborators.
//!
//! - `LoanStore` / `PoolStore`: durable persistence (`PersistLoan`, `PersistPoolState`)
//! - `StatusNotifier`: observability hook (`NotifyStatusChange`), fire-and-forget
//! - Delivery is retried with linear backoff; exhausted retries are logged,
//!   never dropped silently

pub mod collaborator;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod journal;
pub mod memory;

pub use collaborator::{Collaborators, LoanStore, LogNotifier, PoolStore, StatusNotifier};
pub use dispatcher::{CollaboratorBus, DeliveryPolicy};
pub use error::BusError;
pub use event::{LoanEvent, Outbound};
pub use journal::{JournalEntry, JournalRecord, JournalStore};
pub use memory::MemoryCollaborator;
