//! Loan lifecycle state machine.
//!
//! Transitions: open → matched (auto-match or manual interest), matched →
//! accepted (both sides consent), and matched/accepted → open when either
//! side rejects. Rejection is not a terminal state here — it dissolves the
//! pairing and returns the loan to the matching pool.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use peerlend_types::api::{LoanView, UserSummary};
use peerlend_types::models::{LoanRequest, LoanStatus, RespondAction, Role, User};

use crate::error::{LendingError, Result};
use crate::matching;
use crate::policy;
use crate::store::{IdentityDirectory, LoanLedger, LoanPatch, UpdateOutcome};

/// Creation input, validated before anything is persisted.
#[derive(Debug, Clone, Copy)]
pub struct NewLoan {
    pub amount: f64,
    pub interest_rate: f64,
    pub period_months: u32,
}

impl NewLoan {
    fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(LendingError::ValidationFailed(
                "amount must be a positive number".into(),
            ));
        }
        if !self.interest_rate.is_finite() || self.interest_rate < 0.0 {
            return Err(LendingError::ValidationFailed(
                "interest rate must be zero or positive".into(),
            ));
        }
        if self.period_months == 0 {
            return Err(LendingError::ValidationFailed(
                "period must be at least one month".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a create: the persisted loan, and the lender when the
/// matching engine paired it immediately.
#[derive(Debug)]
pub struct CreatedLoan {
    pub loan: LoanRequest,
    pub matched: Option<User>,
}

/// Borrower files a loan request. KYC-gated; the new record lands in `open`
/// and is handed straight to the matching engine.
pub fn create_loan<S>(store: &S, actor: &User, input: NewLoan) -> Result<CreatedLoan>
where
    S: IdentityDirectory + LoanLedger,
{
    if actor.role != Role::Borrower {
        return Err(LendingError::Forbidden("only borrowers may request loans"));
    }
    if !policy::can_create_loan(actor) {
        return Err(LendingError::Forbidden("KYC not verified"));
    }
    input.validate()?;

    let now = Utc::now();
    let loan = LoanRequest {
        id: Uuid::new_v4(),
        borrower: actor.id,
        amount: input.amount,
        interest_rate: input.interest_rate,
        period_months: input.period_months,
        status: LoanStatus::Open,
        matched_with: None,
        borrower_accepted: false,
        lender_accepted: false,
        version: 0,
        created_at: now,
        updated_at: now,
    };
    store.insert_loan(&loan)?;
    info!(loan = %loan.id, borrower = %actor.id, amount = loan.amount, "loan request created");

    match matching::attempt_match(store, &loan)? {
        Some((updated, lender)) => Ok(CreatedLoan {
            loan: updated,
            matched: Some(lender),
        }),
        None => Ok(CreatedLoan { loan, matched: None }),
    }
}

/// Lender manually claims an open loan. The claim is a compare-and-swap on
/// the record, so a loan that was matched in the meantime is a conflict,
/// never an overwrite of the earlier pairing.
pub fn express_interest<S: LoanLedger>(
    store: &S,
    actor: &User,
    loan_id: Uuid,
) -> Result<LoanRequest> {
    if !policy::can_express_interest(actor) {
        return Err(LendingError::Forbidden("only lenders may express interest"));
    }
    let loan = store
        .get_loan(loan_id)?
        .ok_or(LendingError::NotFound("loan"))?;
    if loan.status != LoanStatus::Open {
        return Err(LendingError::Conflict("loan already has an active match"));
    }

    let updated = matching::claim_open_loan(store, &loan, actor.id)?;
    info!(loan = %loan.id, lender = %actor.id, "lender expressed interest");
    Ok(updated)
}

/// One side answers the active match.
///
/// The acting side's flag is applied first; a reject then always wins —
/// even over a fully accepted loan — resetting status, pairing, and both
/// flags so the loan re-enters the pool. Otherwise the loan finalizes to
/// `accepted` once both flags are true.
pub fn respond<S: LoanLedger>(
    store: &S,
    actor: &User,
    loan_id: Uuid,
    action: RespondAction,
) -> Result<LoanRequest> {
    let loan = store
        .get_loan(loan_id)?
        .ok_or(LendingError::NotFound("loan"))?;
    if !policy::can_respond(actor, &loan) {
        return Err(LendingError::Forbidden("not a party to this loan"));
    }
    if !matches!(loan.status, LoanStatus::Matched | LoanStatus::Accepted) {
        return Err(LendingError::Conflict("loan has no active match"));
    }

    let patch = match action {
        RespondAction::Reject => LoanPatch {
            status: Some(LoanStatus::Open),
            matched_with: Some(None),
            borrower_accepted: Some(false),
            lender_accepted: Some(false),
        },
        RespondAction::Accept => {
            let (borrower_accepted, lender_accepted) = match actor.role {
                Role::Borrower => (true, loan.lender_accepted),
                Role::Lender => (loan.borrower_accepted, true),
                // can_respond never admits admins
                Role::Admin => unreachable!("admin passed respond ownership guard"),
            };
            let status = if borrower_accepted && lender_accepted {
                LoanStatus::Accepted
            } else {
                loan.status
            };
            LoanPatch {
                status: Some(status),
                matched_with: None,
                borrower_accepted: Some(borrower_accepted),
                lender_accepted: Some(lender_accepted),
            }
        }
    };

    match store.update_loan(loan.id, loan.version, &patch)? {
        UpdateOutcome::Updated(updated) => {
            match updated.status {
                LoanStatus::Accepted if loan.status != LoanStatus::Accepted => {
                    info!(loan = %updated.id, "loan accepted by both parties");
                }
                LoanStatus::Open => {
                    info!(loan = %updated.id, actor = %actor.id, "match dissolved, loan reopened");
                }
                _ => {}
            }
            Ok(updated)
        }
        UpdateOutcome::Stale => Err(LendingError::Conflict(
            "loan changed while responding",
        )),
        UpdateOutcome::Missing => Err(LendingError::NotFound("loan")),
    }
}

/// Admin flips a user's KYC flag to verified. Idempotent.
pub fn verify_kyc<S: IdentityDirectory>(store: &S, actor: &User, user_id: Uuid) -> Result<()> {
    if !policy::can_administer(actor) {
        return Err(LendingError::Forbidden("admin only"));
    }
    if !store.set_kyc_verified(user_id)? {
        return Err(LendingError::NotFound("user"));
    }
    info!(user = %user_id, admin = %actor.id, "KYC verified");
    Ok(())
}

// -- Read side --

/// Resolve a loan's party references into a client-facing view.
pub fn view_loan<S: IdentityDirectory>(store: &S, loan: &LoanRequest) -> Result<LoanView> {
    let borrower = store
        .get_user(loan.borrower)?
        .ok_or(LendingError::NotFound("borrower"))?;
    let matched_with = match loan.matched_with {
        Some(id) => {
            let lender = store
                .get_user(id)?
                .ok_or(LendingError::NotFound("lender"))?;
            Some(UserSummary::from(&lender))
        }
        None => None,
    };
    Ok(LoanView::new(loan, UserSummary::from(&borrower), matched_with))
}

fn view_all<S: IdentityDirectory>(store: &S, loans: &[LoanRequest]) -> Result<Vec<LoanView>> {
    loans.iter().map(|l| view_loan(store, l)).collect()
}

/// Open requests awaiting a lender. Lender-only.
pub fn open_loans<S>(store: &S, actor: &User) -> Result<Vec<LoanView>>
where
    S: IdentityDirectory + LoanLedger,
{
    if !policy::can_view_open_loans(actor) {
        return Err(LendingError::Forbidden("only lenders may browse open loans"));
    }
    view_all(store, &store.open_loans()?)
}

/// A user's borrowed loans. Owner or admin.
pub fn loans_by_borrower<S>(store: &S, actor: &User, user_id: Uuid) -> Result<Vec<LoanView>>
where
    S: IdentityDirectory + LoanLedger,
{
    if !policy::can_view_dashboard(actor, user_id) {
        return Err(LendingError::Forbidden("not your dashboard"));
    }
    view_all(store, &store.loans_by_borrower(user_id)?)
}

/// Loans a user holds as lender, excluding ones dissolved back to open.
/// Owner or admin.
pub fn loans_by_lender<S>(store: &S, actor: &User, user_id: Uuid) -> Result<Vec<LoanView>>
where
    S: IdentityDirectory + LoanLedger,
{
    if !policy::can_view_dashboard(actor, user_id) {
        return Err(LendingError::Forbidden("not your dashboard"));
    }
    view_all(store, &store.loans_by_lender(user_id)?)
}

/// Every request on the books. Admin-only.
pub fn all_loans<S>(store: &S, actor: &User) -> Result<Vec<LoanView>>
where
    S: IdentityDirectory + LoanLedger,
{
    if !policy::can_administer(actor) {
        return Err(LendingError::Forbidden("admin only"));
    }
    view_all(store, &store.all_loans()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{borrower, lender, user_with_role, MemStore};

    fn new_loan(amount: f64, rate: f64) -> NewLoan {
        NewLoan {
            amount,
            interest_rate: rate,
            period_months: 12,
        }
    }

    #[test]
    fn create_persists_open_when_no_lender_fits() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));

        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();
        assert!(created.matched.is_none());
        assert_eq!(created.loan.status, LoanStatus::Open);
        assert_eq!(created.loan.matched_with, None);
        assert!(!created.loan.borrower_accepted);
        assert!(!created.loan.lender_accepted);
    }

    #[test]
    fn create_auto_matches_first_fit() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let l1 = store.add_user(lender(1000.0, 5.0));
        store.add_user(lender(2000.0, 3.0));

        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();
        assert_eq!(created.matched.as_ref().map(|u| u.id), Some(l1.id));
        assert_eq!(created.loan.status, LoanStatus::Matched);
        assert_eq!(created.loan.matched_with, Some(l1.id));
    }

    #[test]
    fn create_rejects_unverified_borrower_without_persisting() {
        let store = MemStore::new();
        let b = store.add_user(borrower(false));

        let err = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap_err();
        assert!(matches!(err, LendingError::Forbidden(_)));
        assert!(store.all_loans().unwrap().is_empty());
    }

    #[test]
    fn create_rejects_non_borrowers() {
        let store = MemStore::new();
        let l = store.add_user(lender(1000.0, 5.0));
        let err = create_loan(&store, &l, new_loan(500.0, 6.0)).unwrap_err();
        assert!(matches!(err, LendingError::Forbidden(_)));
    }

    #[test]
    fn create_validates_numeric_fields() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));

        for input in [
            new_loan(0.0, 6.0),
            new_loan(-500.0, 6.0),
            new_loan(f64::NAN, 6.0),
            new_loan(500.0, -1.0),
            new_loan(500.0, f64::INFINITY),
            NewLoan {
                amount: 500.0,
                interest_rate: 6.0,
                period_months: 0,
            },
        ] {
            let err = create_loan(&store, &b, input).unwrap_err();
            assert!(matches!(err, LendingError::ValidationFailed(_)), "{input:?}");
        }
        assert!(store.all_loans().unwrap().is_empty());
    }

    #[test]
    fn manual_interest_claims_open_loan() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        let l = store.add_user(lender(100.0, 9.0)); // would never auto-match
        let updated = express_interest(&store, &l, created.loan.id).unwrap();
        assert_eq!(updated.status, LoanStatus::Matched);
        assert_eq!(updated.matched_with, Some(l.id));
    }

    #[test]
    fn interest_on_matched_loan_is_conflict() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        store.add_user(lender(1000.0, 5.0));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();
        assert_eq!(created.loan.status, LoanStatus::Matched);

        let late = store.add_user(lender(1000.0, 5.0));
        let err = express_interest(&store, &late, created.loan.id).unwrap_err();
        assert!(matches!(err, LendingError::Conflict(_)));

        // Earlier pairing intact.
        let stored = store.get_loan(created.loan.id).unwrap().unwrap();
        assert_eq!(stored.matched_with, created.loan.matched_with);
    }

    #[test]
    fn interest_requires_lender_role() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        let err = express_interest(&store, &b, created.loan.id).unwrap_err();
        assert!(matches!(err, LendingError::Forbidden(_)));
    }

    #[test]
    fn finalize_after_both_accept() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let l = store.add_user(lender(1000.0, 5.0));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        let after_borrower = respond(&store, &b, created.loan.id, RespondAction::Accept).unwrap();
        assert!(after_borrower.borrower_accepted);
        assert!(!after_borrower.lender_accepted);
        assert_eq!(after_borrower.status, LoanStatus::Matched);

        let after_lender = respond(&store, &l, created.loan.id, RespondAction::Accept).unwrap();
        assert!(after_lender.borrower_accepted && after_lender.lender_accepted);
        assert_eq!(after_lender.status, LoanStatus::Accepted);
    }

    #[test]
    fn reject_resets_to_open() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let l = store.add_user(lender(1000.0, 5.0));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();
        respond(&store, &b, created.loan.id, RespondAction::Accept).unwrap();

        let reset = respond(&store, &l, created.loan.id, RespondAction::Reject).unwrap();
        assert_eq!(reset.status, LoanStatus::Open);
        assert_eq!(reset.matched_with, None);
        assert!(!reset.borrower_accepted);
        assert!(!reset.lender_accepted);
    }

    #[test]
    fn reject_overrides_full_acceptance() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let l = store.add_user(lender(1000.0, 5.0));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();
        respond(&store, &b, created.loan.id, RespondAction::Accept).unwrap();
        respond(&store, &l, created.loan.id, RespondAction::Accept).unwrap();

        let reset = respond(&store, &b, created.loan.id, RespondAction::Reject).unwrap();
        assert_eq!(reset.status, LoanStatus::Open);
        assert_eq!(reset.matched_with, None);
        assert!(!reset.borrower_accepted && !reset.lender_accepted);
    }

    #[test]
    fn respond_from_non_owner_is_forbidden() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        store.add_user(lender(1000.0, 5.0));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        let stranger = store.add_user(borrower(true));
        let err = respond(&store, &stranger, created.loan.id, RespondAction::Accept).unwrap_err();
        assert!(matches!(err, LendingError::Forbidden(_)));

        let stored = store.get_loan(created.loan.id).unwrap().unwrap();
        assert!(!stored.borrower_accepted);
        assert_eq!(stored.status, LoanStatus::Matched);
    }

    #[test]
    fn respond_on_open_loan_is_conflict() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();
        assert_eq!(created.loan.status, LoanStatus::Open);

        let err = respond(&store, &b, created.loan.id, RespondAction::Accept).unwrap_err();
        assert!(matches!(err, LendingError::Conflict(_)));
    }

    #[test]
    fn respond_on_missing_loan_is_not_found() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let err = respond(&store, &b, Uuid::new_v4(), RespondAction::Accept).unwrap_err();
        assert!(matches!(err, LendingError::NotFound(_)));
    }

    #[test]
    fn verify_kyc_gates_on_admin_and_unlocks_create() {
        let store = MemStore::new();
        let admin = store.add_user(user_with_role(Role::Admin));
        let b = store.add_user(borrower(false));

        let err = verify_kyc(&store, &b, b.id).unwrap_err();
        assert!(matches!(err, LendingError::Forbidden(_)));

        verify_kyc(&store, &admin, b.id).unwrap();
        let refreshed = store.get_user(b.id).unwrap().unwrap();
        assert!(refreshed.kyc.verified);
        create_loan(&store, &refreshed, new_loan(500.0, 6.0)).unwrap();
    }

    #[test]
    fn lender_dashboard_excludes_reopened_loans() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let l = store.add_user(lender(1000.0, 5.0));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        assert_eq!(loans_by_lender(&store, &l, l.id).unwrap().len(), 1);

        respond(&store, &l, created.loan.id, RespondAction::Reject).unwrap();
        assert!(loans_by_lender(&store, &l, l.id).unwrap().is_empty());
    }

    #[test]
    fn dashboards_enforce_owner_or_admin() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let other = store.add_user(borrower(true));
        let admin = store.add_user(user_with_role(Role::Admin));
        create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        assert!(loans_by_borrower(&store, &other, b.id).is_err());
        assert_eq!(loans_by_borrower(&store, &b, b.id).unwrap().len(), 1);
        assert_eq!(loans_by_borrower(&store, &admin, b.id).unwrap().len(), 1);
    }

    #[test]
    fn open_listing_is_lender_only_and_views_resolve_parties() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let l = store.add_user(lender(10.0, 20.0)); // won't match anything here
        create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        assert!(open_loans(&store, &b).is_err());
        let views = open_loans(&store, &l).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].borrower.id, b.id);
        assert!(views[0].matched_with.is_none());
    }

    #[test]
    fn all_loans_is_admin_only() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let admin = store.add_user(user_with_role(Role::Admin));
        create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        assert!(all_loans(&store, &b).is_err());
        assert_eq!(all_loans(&store, &admin).unwrap().len(), 1);
    }

    // Status/flag invariants, checked across a whole lifecycle run.
    #[test]
    fn accepted_always_implies_both_flags() {
        let store = MemStore::new();
        let b = store.add_user(borrower(true));
        let l = store.add_user(lender(1000.0, 5.0));
        let created = create_loan(&store, &b, new_loan(500.0, 6.0)).unwrap();

        respond(&store, &b, created.loan.id, RespondAction::Accept).unwrap();
        respond(&store, &l, created.loan.id, RespondAction::Accept).unwrap();

        for loan in store.all_loans().unwrap() {
            if loan.status == LoanStatus::Accepted {
                assert!(loan.borrower_accepted && loan.lender_accepted);
            }
            if loan.status == LoanStatus::Open {
                assert!(loan.matched_with.is_none());
                assert!(!loan.borrower_accepted && !loan.lender_accepted);
            }
        }
    }
}
