//! In-memory store double backing the core tests.

use std::sync::Mutex;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use peerlend_types::models::{Kyc, LenderProfile, LoanRequest, LoanStatus, Role, User};

use crate::store::{IdentityDirectory, LoanLedger, LoanPatch, UpdateOutcome};

pub fn user_with_role(role: Role) -> User {
    let now = Utc::now();
    let id = Uuid::new_v4();
    User {
        id,
        name: format!("user-{}", &id.to_string()[..8]),
        email: format!("{id}@example.test"),
        role,
        kyc: Kyc {
            verified: true,
            ..Default::default()
        },
        lender_profile: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn borrower(verified: bool) -> User {
    let mut user = user_with_role(Role::Borrower);
    user.kyc.verified = verified;
    user
}

pub fn lender(max_amount: f64, interest_rate: f64) -> User {
    let mut user = user_with_role(Role::Lender);
    user.lender_profile = Some(LenderProfile {
        max_amount,
        interest_rate,
    });
    user
}

pub fn loan_for(borrower: &User, amount: f64, interest_rate: f64) -> LoanRequest {
    let now = Utc::now();
    LoanRequest {
        id: Uuid::new_v4(),
        borrower: borrower.id,
        amount,
        interest_rate,
        period_months: 12,
        status: LoanStatus::Open,
        matched_with: None,
        borrower_accepted: false,
        lender_accepted: false,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

/// Both store traits over plain vectors. Users keep insertion order, which
/// is the "directory iteration order" the matching tests pin down.
#[derive(Default)]
pub struct MemStore {
    users: Mutex<Vec<User>>,
    loans: Mutex<Vec<LoanRequest>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) -> User {
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn add_loan(&self, loan: LoanRequest) -> LoanRequest {
        self.loans.lock().unwrap().push(loan.clone());
        loan
    }

    /// Simulate a concurrent writer touching the record.
    pub fn bump_version(&self, id: Uuid) {
        let mut loans = self.loans.lock().unwrap();
        let loan = loans.iter_mut().find(|l| l.id == id).unwrap();
        loan.version += 1;
    }
}

impl IdentityDirectory for MemStore {
    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    fn find_verified_lenders(&self) -> Result<Vec<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.role == Role::Lender && u.kyc.verified)
            .cloned()
            .collect())
    }

    fn set_kyc_verified(&self, id: Uuid) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.kyc.verified = true;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl LoanLedger for MemStore {
    fn insert_loan(&self, loan: &LoanRequest) -> Result<()> {
        self.loans.lock().unwrap().push(loan.clone());
        Ok(())
    }

    fn get_loan(&self, id: Uuid) -> Result<Option<LoanRequest>> {
        Ok(self.loans.lock().unwrap().iter().find(|l| l.id == id).cloned())
    }

    fn loans_by_borrower(&self, borrower: Uuid) -> Result<Vec<LoanRequest>> {
        Ok(self
            .loans
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.borrower == borrower)
            .cloned()
            .collect())
    }

    fn loans_by_lender(&self, lender: Uuid) -> Result<Vec<LoanRequest>> {
        Ok(self
            .loans
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.matched_with == Some(lender) && l.status != LoanStatus::Open)
            .cloned()
            .collect())
    }

    fn open_loans(&self) -> Result<Vec<LoanRequest>> {
        Ok(self
            .loans
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == LoanStatus::Open)
            .cloned()
            .collect())
    }

    fn all_loans(&self) -> Result<Vec<LoanRequest>> {
        Ok(self.loans.lock().unwrap().clone())
    }

    fn update_loan(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: &LoanPatch,
    ) -> Result<UpdateOutcome> {
        let mut loans = self.loans.lock().unwrap();
        let Some(loan) = loans.iter_mut().find(|l| l.id == id) else {
            return Ok(UpdateOutcome::Missing);
        };
        if loan.version != expected_version {
            return Ok(UpdateOutcome::Stale);
        }
        if let Some(status) = patch.status {
            loan.status = status;
        }
        if let Some(matched_with) = patch.matched_with {
            loan.matched_with = matched_with;
        }
        if let Some(flag) = patch.borrower_accepted {
            loan.borrower_accepted = flag;
        }
        if let Some(flag) = patch.lender_accepted {
            loan.lender_accepted = flag;
        }
        loan.version += 1;
        loan.updated_at = Utc::now();
        Ok(UpdateOutcome::Updated(loan.clone()))
    }
}
