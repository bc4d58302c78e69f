//! FlashPool Loan Ledger
//!
//! The authoritative set of loan records. Records are never deleted; the only
//! mutation is a state transition, performed as one compare-and-swap on the
//! loan's packed state word.
//!
//! # Key Types
//! - `LoanDraft`: A loan under construction (state `Pending`)
//! - `Loan`: Immutable terms of an admitted loan
//! - `LoanView`: Terms plus current state and settlement time
//! - `LoanState`: `Pending → Executed → (Repaid | Defaulted)`

pub mod error;
pub mod ledger;
pub mod loan;

pub use error::LedgerError;
pub use ledger::LoanLedger;
pub use loan::{Loan, LoanDraft, LoanState, LoanView};
