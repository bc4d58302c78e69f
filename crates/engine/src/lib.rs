//! FlashPool Engine
//!
//! Wires the pool registry, loan ledger and collaborator bus into the
//! admission → execution → settlement lifecycle:
//!
//! - [`AdmissionController`]: validates, prices and reserves new loans
//! - [`ExpiryScheduler`]: one cancellable deadline per executed loan
//! - [`SettlementProcessor`]: repayment and default paths
//! - [`FlashLoanEngine`]: the facade callers use

pub mod admission;
pub mod config;
pub mod engine;
pub mod error;
mod publish;
pub mod scheduler;
pub mod settlement;

pub use admission::{AdmissionController, AdmissionReceipt};
pub use config::{ConfigError, ConfigLoader, EngineConfig, OverpaymentPolicy};
pub use engine::FlashLoanEngine;
pub use error::EngineError;
pub use scheduler::ExpiryScheduler;
pub use settlement::{RepayReceipt, SettlementProcessor};
