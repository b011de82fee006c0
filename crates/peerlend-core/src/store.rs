use anyhow::Result;
use uuid::Uuid;

use peerlend_types::models::{LoanRequest, LoanStatus, User};

/// Read access to the user directory, plus the one admin-driven write.
/// Implemented by the SQLite store and by in-memory doubles in tests.
pub trait IdentityDirectory {
    fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// All KYC-verified lenders, in stable directory order. Matching relies
    /// on this order being deterministic between calls.
    fn find_verified_lenders(&self) -> Result<Vec<User>>;

    /// Flip the KYC flag to verified. Returns false when no such user.
    fn set_kyc_verified(&self, id: Uuid) -> Result<bool>;
}

/// Partial update applied to a loan record. `None` leaves a field untouched;
/// for `matched_with` the outer `Some` carries the new value, so
/// `Some(None)` clears the pairing.
#[derive(Debug, Clone, Default)]
pub struct LoanPatch {
    pub status: Option<LoanStatus>,
    pub matched_with: Option<Option<Uuid>>,
    pub borrower_accepted: Option<bool>,
    pub lender_accepted: Option<bool>,
}

/// Result of a compare-and-swap loan update.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The swap applied; the returned record carries the bumped version.
    Updated(LoanRequest),
    /// The record exists but its version moved on — someone else wrote first.
    Stale,
    /// No record with that id.
    Missing,
}

/// Durable loan-request store. All mutations after insert go through
/// `update_loan`, which must apply the patch atomically and only if
/// `expected_version` still matches the stored record.
pub trait LoanLedger {
    fn insert_loan(&self, loan: &LoanRequest) -> Result<()>;

    fn get_loan(&self, id: Uuid) -> Result<Option<LoanRequest>>;

    fn loans_by_borrower(&self, borrower: Uuid) -> Result<Vec<LoanRequest>>;

    /// Loans currently or previously held by this lender, excluding `open`
    /// ones — a dissolved match returns the loan to the pool and drops it
    /// from the lender's view.
    fn loans_by_lender(&self, lender: Uuid) -> Result<Vec<LoanRequest>>;

    fn open_loans(&self) -> Result<Vec<LoanRequest>>;

    fn all_loans(&self) -> Result<Vec<LoanRequest>>;

    fn update_loan(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: &LoanPatch,
    ) -> Result<UpdateOutcome>;
}
