//! First-fit lender matching.
//!
//! Selection is deliberately first-fit over the directory's stable order,
//! not best-fit: the first verified lender whose terms cover the request
//! wins, which keeps the outcome deterministic for a given directory state.

use tracing::info;
use uuid::Uuid;

use peerlend_types::models::{LoanRequest, LoanStatus, User};

use crate::error::{LendingError, Result};
use crate::store::{IdentityDirectory, LoanLedger, LoanPatch, UpdateOutcome};

/// A lender covers a loan when their per-loan ceiling reaches the requested
/// principal and their minimum rate does not exceed the offered rate.
pub fn qualifies(lender: &User, loan: &LoanRequest) -> bool {
    match lender.lender_profile {
        Some(profile) => {
            profile.max_amount >= loan.amount && profile.interest_rate <= loan.interest_rate
        }
        None => false,
    }
}

/// Scan verified lenders and pair the loan with the first qualifying one.
///
/// The caller guarantees `loan.status` is `Open`; the write itself is a
/// compare-and-swap on the loan's version, so a concurrent match or manual
/// interest on the same record loses cleanly as `Conflict` instead of
/// overwriting the earlier pairing.
///
/// `Ok(None)` — no qualifying lender — is a valid outcome, not a failure;
/// the loan stays open for manual interest.
pub fn attempt_match<S>(store: &S, loan: &LoanRequest) -> Result<Option<(LoanRequest, User)>>
where
    S: IdentityDirectory + LoanLedger,
{
    debug_assert_eq!(loan.status, LoanStatus::Open);

    let lenders = store.find_verified_lenders()?;
    let Some(candidate) = lenders.into_iter().find(|l| qualifies(l, loan)) else {
        return Ok(None);
    };

    let updated = claim_open_loan(store, loan, candidate.id)?;
    info!(loan = %loan.id, lender = %candidate.id, "auto-matched loan");
    Ok(Some((updated, candidate)))
}

/// Shared by auto-match and manual interest: CAS the loan from open to
/// matched with the given lender.
pub(crate) fn claim_open_loan<S: LoanLedger>(
    store: &S,
    loan: &LoanRequest,
    lender_id: Uuid,
) -> Result<LoanRequest> {
    let patch = LoanPatch {
        status: Some(LoanStatus::Matched),
        matched_with: Some(Some(lender_id)),
        ..Default::default()
    };
    match store.update_loan(loan.id, loan.version, &patch)? {
        UpdateOutcome::Updated(updated) => Ok(updated),
        UpdateOutcome::Stale => Err(LendingError::Conflict(
            "loan already has an active match",
        )),
        UpdateOutcome::Missing => Err(LendingError::NotFound("loan")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{borrower, lender, loan_for, MemStore};

    #[test]
    fn picks_first_qualifying_lender_not_best() {
        let store = MemStore::new();
        let b = borrower(true);
        // L1 qualifies at a worse rate than L2; first-fit must still take L1.
        let l1 = store.add_user(lender(1000.0, 5.0));
        let l2 = store.add_user(lender(2000.0, 3.0));
        let loan = store.add_loan(loan_for(&b, 500.0, 6.0));

        let (updated, chosen) = attempt_match(&store, &loan).unwrap().unwrap();
        assert_eq!(chosen.id, l1.id);
        assert_ne!(chosen.id, l2.id);
        assert_eq!(updated.status, LoanStatus::Matched);
        assert_eq!(updated.matched_with, Some(l1.id));
    }

    #[test]
    fn no_candidate_leaves_loan_open() {
        let store = MemStore::new();
        let b = borrower(true);
        store.add_user(lender(100.0, 5.0)); // ceiling too low
        store.add_user(lender(5000.0, 9.0)); // rate demand too high
        let loan = store.add_loan(loan_for(&b, 500.0, 6.0));

        assert!(attempt_match(&store, &loan).unwrap().is_none());
        let stored = store.get_loan(loan.id).unwrap().unwrap();
        assert_eq!(stored.status, LoanStatus::Open);
        assert_eq!(stored.matched_with, None);
    }

    #[test]
    fn zero_capacity_lender_never_qualifies() {
        let l = lender(0.0, 0.0);
        let loan = loan_for(&borrower(true), 0.01, 10.0);
        assert!(!qualifies(&l, &loan));
    }

    #[test]
    fn unverified_lenders_are_not_scanned() {
        let store = MemStore::new();
        let b = borrower(true);
        let mut hidden = lender(5000.0, 1.0);
        hidden.kyc.verified = false;
        store.add_user(hidden);
        let loan = store.add_loan(loan_for(&b, 500.0, 6.0));

        assert!(attempt_match(&store, &loan).unwrap().is_none());
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let store = MemStore::new();
        let b = borrower(true);
        store.add_user(lender(1000.0, 5.0));
        let loan = store.add_loan(loan_for(&b, 500.0, 6.0));

        // Someone else wrote the record after our snapshot was taken.
        store.bump_version(loan.id);

        let err = attempt_match(&store, &loan).unwrap_err();
        assert!(matches!(err, LendingError::Conflict(_)));
    }
}
