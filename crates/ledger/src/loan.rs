//! Loan records and lifecycle states

use chrono::{DateTime, Utc};
use flashpool_core::{math, Amount, Chain, LoanId, MathError, PoolId, Token};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Loan lifecycle state
///
/// ```text
/// Pending ──► Executed ──► Repaid
///                 │
///                 └──────► Defaulted
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    /// Under construction, never stored in the ledger
    Pending,
    /// Liquidity reserved and handed to the borrower
    Executed,
    /// Principal plus fee paid back
    Repaid,
    /// Deadline passed without repayment
    Defaulted,
}

impl LoanState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanState::Repaid | LoanState::Defaulted)
    }

    /// Only `Executed → Repaid` and `Executed → Defaulted` are legal
    pub fn can_transition_to(&self, to: LoanState) -> bool {
        matches!(
            (self, to),
            (LoanState::Executed, LoanState::Repaid) | (LoanState::Executed, LoanState::Defaulted)
        )
    }

    pub(crate) fn code(&self) -> u64 {
        match self {
            LoanState::Pending => 0,
            LoanState::Executed => 1,
            LoanState::Repaid => 2,
            LoanState::Defaulted => 3,
        }
    }

    pub(crate) fn from_code(code: u64) -> Self {
        match code {
            1 => LoanState::Executed,
            2 => LoanState::Repaid,
            3 => LoanState::Defaulted,
            _ => LoanState::Pending,
        }
    }
}

/// A loan that passed admission but has not been stored yet
#[derive(Debug, Clone)]
pub struct LoanDraft {
    pub pool_id: PoolId,
    pub chain: Chain,
    pub token: Token,
    pub borrower: String,
    pub principal: Amount,
    pub fee: Amount,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reference: String,
}

/// Immutable terms of an admitted loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub pool_id: PoolId,
    pub chain: Chain,
    pub token: Token,
    pub borrower: String,
    pub principal: Amount,
    pub fee: Amount,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Opaque transaction reference (`<chain>_<unix-millis>_<random>`)
    pub reference: String,
}

impl Loan {
    pub(crate) fn from_draft(id: LoanId, draft: LoanDraft) -> Self {
        Self {
            id,
            pool_id: draft.pool_id,
            chain: draft.chain,
            token: draft.token,
            borrower: draft.borrower,
            principal: draft.principal,
            fee: draft.fee,
            created_at: draft.created_at,
            expires_at: draft.expires_at,
            reference: draft.reference,
        }
    }

    /// Exact amount that settles the loan: `principal + fee`
    pub fn repayment_due(&self) -> Result<Amount, MathError> {
        math::repayment_due(self.principal, self.fee)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Loan terms together with the current lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanView {
    #[serde(flatten)]
    pub loan: Loan,
    pub state: LoanState,
    /// Set when the loan reached `Repaid`
    pub repaid_at: Option<DateTime<Utc>>,
    /// Time of the terminal transition, repaid or defaulted
    pub finalized_at: Option<DateTime<Utc>>,
}

impl LoanView {
    pub fn id(&self) -> LoanId {
        self.loan.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_edges() {
        assert!(LoanState::Executed.can_transition_to(LoanState::Repaid));
        assert!(LoanState::Executed.can_transition_to(LoanState::Defaulted));
        assert!(!LoanState::Pending.can_transition_to(LoanState::Repaid));
        assert!(!LoanState::Repaid.can_transition_to(LoanState::Defaulted));
        assert!(!LoanState::Executed.can_transition_to(LoanState::Pending));
    }

    #[test]
    fn test_state_codes_roundtrip() {
        for state in [
            LoanState::Pending,
            LoanState::Executed,
            LoanState::Repaid,
            LoanState::Defaulted,
        ] {
            assert_eq!(LoanState::from_code(state.code()), state);
        }
    }

    #[test]
    fn test_state_display_and_parse() {
        assert_eq!(LoanState::Defaulted.to_string(), "defaulted");
        assert_eq!("repaid".parse::<LoanState>().unwrap(), LoanState::Repaid);
        assert_eq!(
            serde_json::to_string(&LoanState::Executed).unwrap(),
            "\"executed\""
        );
    }

    #[test]
    fn test_terminal() {
        assert!(LoanState::Repaid.is_terminal());
        assert!(LoanState::Defaulted.is_terminal());
        assert!(!LoanState::Executed.is_terminal());
    }
}
