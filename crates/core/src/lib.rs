//! FlashPool Core - Domain types and fee math
//!
//! This crate contains the fundamental types used across FlashPool:
//! - `Amount`: Token quantity in the token's smallest unit
//! - `Bps`: Basis-point rate (1/100 of a percent)
//! - `Chain` / `Token`: Type-safe chain and token codes
//! - `PoolId` / `LoanId`: Opaque identifiers
//! - `math`: Pure fee and admission-bound calculator

pub mod amount;
pub mod asset;
pub mod id;
pub mod math;

pub use amount::Amount;
pub use asset::{AssetError, Chain, Token};
pub use id::{LoanId, PoolId};
pub use math::{Bps, MathError, BPS_DENOMINATOR};
