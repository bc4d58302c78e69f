//! Loan ledger implementation

use crate::error::LedgerError;
use crate::loan::{Loan, LoanDraft, LoanState, LoanView};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use flashpool_core::{Chain, LoanId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const STATE_BITS: u32 = 8;
const STATE_MASK: u64 = (1 << STATE_BITS) - 1;

/// State word layout: low 8 bits hold the state code, the rest hold the
/// terminal transition time in unix millis (0 while not finalized).
/// State and settlement time therefore change in a single CAS.
fn pack(state: LoanState, at: Option<DateTime<Utc>>) -> u64 {
    let millis = at.map_or(0, |t| t.timestamp_millis().max(0) as u64);
    (millis << STATE_BITS) | state.code()
}

fn unpack(word: u64) -> (LoanState, Option<DateTime<Utc>>) {
    let state = LoanState::from_code(word & STATE_MASK);
    let millis = word >> STATE_BITS;
    let at = if millis == 0 {
        None
    } else {
        DateTime::from_timestamp_millis(millis as i64)
    };
    (state, at)
}

#[derive(Debug)]
struct LoanEntry {
    loan: Loan,
    word: AtomicU64,
}

impl LoanEntry {
    fn view(&self) -> LoanView {
        let (state, finalized_at) = unpack(self.word.load(Ordering::Acquire));
        LoanView {
            loan: self.loan.clone(),
            state,
            repaid_at: finalized_at.filter(|_| state == LoanState::Repaid),
            finalized_at,
        }
    }
}

/// Authoritative store of loan records
#[derive(Debug)]
pub struct LoanLedger {
    loans: DashMap<LoanId, Arc<LoanEntry>>,
    next_id: AtomicU64,
}

impl Default for LoanLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LoanLedger {
    pub fn new() -> Self {
        Self {
            loans: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store an admitted loan. The draft leaves `Pending` and enters the
    /// ledger directly as `Executed`.
    pub fn commit(&self, draft: LoanDraft) -> LoanView {
        let id = LoanId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let entry = Arc::new(LoanEntry {
            loan: Loan::from_draft(id, draft),
            word: AtomicU64::new(pack(LoanState::Executed, None)),
        });
        let view = entry.view();
        self.loans.insert(id, entry);

        tracing::debug!(
            loan_id = %id,
            pool_id = %view.loan.pool_id,
            principal = %view.loan.principal,
            "Loan recorded as executed"
        );

        view
    }

    fn entry(&self, loan_id: LoanId) -> Result<Arc<LoanEntry>, LedgerError> {
        self.loans
            .get(&loan_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(LedgerError::NotFound(loan_id))
    }

    pub fn get(&self, loan_id: LoanId) -> Result<LoanView, LedgerError> {
        Ok(self.entry(loan_id)?.view())
    }

    /// Move a loan from `from` to `to`, stamping `at` as the settlement time.
    ///
    /// Exactly one caller can win the terminal transition of a loan; every
    /// later attempt observes `AlreadyFinalized`.
    pub fn transition(
        &self,
        loan_id: LoanId,
        from: LoanState,
        to: LoanState,
        at: DateTime<Utc>,
    ) -> Result<LoanView, LedgerError> {
        let entry = self.entry(loan_id)?;

        if !from.can_transition_to(to) {
            return Err(LedgerError::InvalidTransition { loan_id, from, to });
        }

        let expected = pack(from, None);
        let next = pack(to, Some(at));

        match entry
            .word
            .compare_exchange(expected, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                tracing::debug!(loan_id = %loan_id, %from, %to, "Loan transitioned");
                Ok(entry.view())
            }
            Err(actual) => {
                let (current, _) = unpack(actual);
                if current.is_terminal() {
                    Err(LedgerError::AlreadyFinalized {
                        loan_id,
                        state: current,
                    })
                } else {
                    Err(LedgerError::InvalidTransition {
                        loan_id,
                        from: current,
                        to,
                    })
                }
            }
        }
    }

    /// Loan history of a borrower, newest first
    pub fn by_borrower(&self, borrower: &str, chain: Option<&Chain>) -> Vec<LoanView> {
        let mut views: Vec<LoanView> = self
            .loans
            .iter()
            .filter(|e| e.loan.borrower == borrower)
            .filter(|e| chain.map_or(true, |c| e.loan.chain == *c))
            .map(|e| e.view())
            .collect();

        views.sort_by(|a, b| {
            b.loan
                .created_at
                .cmp(&a.loan.created_at)
                .then(b.loan.id.cmp(&a.loan.id))
        });
        views
    }

    /// Loans still holding a reservation
    pub fn executed(&self) -> Vec<LoanView> {
        let mut views: Vec<LoanView> = self
            .loans
            .iter()
            .map(|e| e.view())
            .filter(|v| v.state == LoanState::Executed)
            .collect();
        views.sort_by_key(|v| v.loan.id);
        views
    }

    pub fn active_count(&self) -> usize {
        self.loans
            .iter()
            .filter(|e| unpack(e.word.load(Ordering::Acquire)).0 == LoanState::Executed)
            .count()
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use flashpool_core::{Amount, PoolId};
    use std::thread;

    fn draft(borrower: &str, chain: Chain) -> LoanDraft {
        let now = Utc::now();
        LoanDraft {
            pool_id: PoolId::new(1),
            chain,
            token: "EOS".parse().unwrap(),
            borrower: borrower.to_string(),
            principal: Amount::new(500),
            fee: Amount::new(1),
            created_at: now,
            expires_at: now + Duration::seconds(60),
            reference: "eos_0_test".to_string(),
        }
    }

    #[test]
    fn test_commit_enters_executed() {
        let ledger = LoanLedger::new();
        let view = ledger.commit(draft("alice", Chain::Eos));

        assert_eq!(view.id(), LoanId::new(1));
        assert_eq!(view.state, LoanState::Executed);
        assert!(view.finalized_at.is_none());
        assert_eq!(ledger.active_count(), 1);
    }

    #[test]
    fn test_transition_to_repaid_stamps_time() {
        let ledger = LoanLedger::new();
        let id = ledger.commit(draft("alice", Chain::Eos)).id();
        let at = Utc::now();

        let view = ledger
            .transition(id, LoanState::Executed, LoanState::Repaid, at)
            .unwrap();

        assert_eq!(view.state, LoanState::Repaid);
        assert_eq!(
            view.repaid_at.map(|t| t.timestamp_millis()),
            Some(at.timestamp_millis())
        );
        assert_eq!(ledger.active_count(), 0);
    }

    #[test]
    fn test_second_transition_is_already_finalized() {
        let ledger = LoanLedger::new();
        let id = ledger.commit(draft("alice", Chain::Eos)).id();

        ledger
            .transition(id, LoanState::Executed, LoanState::Defaulted, Utc::now())
            .unwrap();
        let second = ledger.transition(id, LoanState::Executed, LoanState::Repaid, Utc::now());

        assert_eq!(
            second,
            Err(LedgerError::AlreadyFinalized {
                loan_id: id,
                state: LoanState::Defaulted
            })
        );
        let view = ledger.get(id).unwrap();
        assert_eq!(view.state, LoanState::Defaulted);
        assert!(view.repaid_at.is_none());
        assert!(view.finalized_at.is_some());
    }

    #[test]
    fn test_illegal_edge_rejected() {
        let ledger = LoanLedger::new();
        let id = ledger.commit(draft("alice", Chain::Eos)).id();

        let result = ledger.transition(id, LoanState::Repaid, LoanState::Defaulted, Utc::now());
        assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
        assert_eq!(ledger.get(id).unwrap().state, LoanState::Executed);
    }

    #[test]
    fn test_unknown_loan() {
        let ledger = LoanLedger::new();
        assert_eq!(
            ledger.get(LoanId::new(3)),
            Err(LedgerError::NotFound(LoanId::new(3)))
        );
    }

    #[test]
    fn test_racing_transitions_single_winner() {
        let ledger = Arc::new(LoanLedger::new());
        let id = ledger.commit(draft("alice", Chain::Eos)).id();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let to = if i % 2 == 0 {
                    LoanState::Repaid
                } else {
                    LoanState::Defaulted
                };
                thread::spawn(move || ledger.transition(id, LoanState::Executed, to, Utc::now()))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let finalized = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_already_finalized()))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(finalized, 7);
    }

    #[test]
    fn test_by_borrower_filters_and_orders() {
        let ledger = LoanLedger::new();
        let first = ledger.commit(draft("alice", Chain::Eos)).id();
        ledger.commit(draft("bob", Chain::Eos));
        let third = ledger.commit(draft("alice", Chain::Ton)).id();

        let all = ledger.by_borrower("alice", None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), third);
        assert_eq!(all[1].id(), first);

        let eos_only = ledger.by_borrower("alice", Some(&Chain::Eos));
        assert_eq!(eos_only.len(), 1);
        assert_eq!(eos_only[0].id(), first);
    }

    #[test]
    fn test_pack_roundtrip() {
        let at = Utc::now();
        let (state, stamped) = unpack(pack(LoanState::Repaid, Some(at)));
        assert_eq!(state, LoanState::Repaid);
        assert_eq!(stamped.unwrap().timestamp_millis(), at.timestamp_millis());
        assert_eq!(unpack(pack(LoanState::Executed, None)), (LoanState::Executed, None));
    }
}
