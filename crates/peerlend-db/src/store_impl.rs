//! `IdentityDirectory` / `LoanLedger` implementations over SQLite.
//!
//! Lender directory order is insertion order (`rowid`), which makes the
//! first-fit scan deterministic. All loan mutations funnel through the
//! version-guarded UPDATE in `update_loan`.

use anyhow::Result;
use uuid::Uuid;

use peerlend_core::store::{IdentityDirectory, LoanLedger, LoanPatch, UpdateOutcome};
use peerlend_types::models::{LoanRequest, User};

use crate::Database;
use crate::queries::{
    OptionalExt, loan_from_row, query_loan_by_id, query_loans, query_users, user_from_row,
};

impl IdentityDirectory for Database {
    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.get_user_row_by_id(&id.to_string())?
            .map(user_from_row)
            .transpose()
    }

    fn find_verified_lenders(&self) -> Result<Vec<User>> {
        let rows = self.with_conn(|conn| {
            query_users(
                conn,
                "SELECT * FROM users WHERE role = 'lender' AND kyc_verified = 1 ORDER BY rowid",
                [],
            )
        })?;
        rows.into_iter().map(user_from_row).collect()
    }

    fn set_kyc_verified(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users SET kyc_verified = 1, updated_at = datetime('now') WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(affected > 0)
        })
    }
}

impl LoanLedger for Database {
    fn insert_loan(&self, loan: &LoanRequest) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO loans (id, borrower, amount, interest_rate, period_months,
                                    status, matched_with, borrower_accepted, lender_accepted,
                                    version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    loan.id.to_string(),
                    loan.borrower.to_string(),
                    loan.amount,
                    loan.interest_rate,
                    loan.period_months,
                    loan.status.as_str(),
                    loan.matched_with.map(|id| id.to_string()),
                    loan.borrower_accepted,
                    loan.lender_accepted,
                    loan.version,
                    loan.created_at.to_rfc3339(),
                    loan.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn get_loan(&self, id: Uuid) -> Result<Option<LoanRequest>> {
        self.with_conn(|conn| query_loan_by_id(conn, &id.to_string()))?
            .map(loan_from_row)
            .transpose()
    }

    fn loans_by_borrower(&self, borrower: Uuid) -> Result<Vec<LoanRequest>> {
        let rows = self.with_conn(|conn| {
            query_loans(
                conn,
                "SELECT * FROM loans WHERE borrower = ?1 ORDER BY rowid DESC",
                [borrower.to_string()],
            )
        })?;
        rows.into_iter().map(loan_from_row).collect()
    }

    fn loans_by_lender(&self, lender: Uuid) -> Result<Vec<LoanRequest>> {
        let rows = self.with_conn(|conn| {
            query_loans(
                conn,
                "SELECT * FROM loans WHERE matched_with = ?1 AND status != 'open'
                 ORDER BY rowid DESC",
                [lender.to_string()],
            )
        })?;
        rows.into_iter().map(loan_from_row).collect()
    }

    fn open_loans(&self) -> Result<Vec<LoanRequest>> {
        let rows = self.with_conn(|conn| {
            query_loans(
                conn,
                "SELECT * FROM loans WHERE status = 'open' ORDER BY rowid",
                [],
            )
        })?;
        rows.into_iter().map(loan_from_row).collect()
    }

    fn all_loans(&self) -> Result<Vec<LoanRequest>> {
        let rows = self.with_conn(|conn| {
            query_loans(conn, "SELECT * FROM loans ORDER BY rowid DESC", [])
        })?;
        rows.into_iter().map(loan_from_row).collect()
    }

    fn update_loan(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: &LoanPatch,
    ) -> Result<UpdateOutcome> {
        self.with_conn(|conn| {
            let mut sets = vec![
                "version = version + 1".to_string(),
                "updated_at = datetime('now')".to_string(),
            ];
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            let mut idx = 0;

            if let Some(status) = patch.status {
                idx += 1;
                sets.push(format!("status = ?{idx}"));
                params.push(Box::new(status.as_str()));
            }
            if let Some(matched_with) = patch.matched_with {
                idx += 1;
                sets.push(format!("matched_with = ?{idx}"));
                params.push(Box::new(matched_with.map(|id| id.to_string())));
            }
            if let Some(flag) = patch.borrower_accepted {
                idx += 1;
                sets.push(format!("borrower_accepted = ?{idx}"));
                params.push(Box::new(flag));
            }
            if let Some(flag) = patch.lender_accepted {
                idx += 1;
                sets.push(format!("lender_accepted = ?{idx}"));
                params.push(Box::new(flag));
            }

            let sql = format!(
                "UPDATE loans SET {} WHERE id = ?{} AND version = ?{}",
                sets.join(", "),
                idx + 1,
                idx + 2
            );
            let id_str = id.to_string();
            params.push(Box::new(id_str.clone()));
            params.push(Box::new(expected_version));

            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            let affected = conn.execute(&sql, param_refs.as_slice())?;

            if affected == 0 {
                // Distinguish a vanished record from a lost race.
                let exists = conn
                    .query_row("SELECT 1 FROM loans WHERE id = ?1", [&id_str], |_| Ok(()))
                    .optional()?
                    .is_some();
                return Ok(if exists {
                    UpdateOutcome::Stale
                } else {
                    UpdateOutcome::Missing
                });
            }

            let row = query_loan_by_id(conn, &id_str)?
                .ok_or_else(|| anyhow::anyhow!("loan {} gone after update", id_str))?;
            Ok(UpdateOutcome::Updated(loan_from_row(row)?))
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use peerlend_core::store::{IdentityDirectory, LoanLedger, LoanPatch, UpdateOutcome};
    use peerlend_types::models::{
        Kyc, LenderProfile, LoanRequest, LoanStatus, Role, User,
    };

    use crate::Database;

    fn seed_user(db: &Database, role: Role, verified: bool) -> User {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let user = User {
            id,
            name: format!("u-{}", &id.to_string()[..8]),
            email: format!("{id}@example.test"),
            role,
            kyc: Kyc {
                verified,
                ..Default::default()
            },
            lender_profile: (role == Role::Lender).then_some(LenderProfile {
                max_amount: 1000.0,
                interest_rate: 5.0,
            }),
            created_at: now,
            updated_at: now,
        };
        db.create_user(&user, "hash").unwrap();
        user
    }

    fn seed_loan(db: &Database, borrower: &User) -> LoanRequest {
        let now = Utc::now();
        let loan = LoanRequest {
            id: Uuid::new_v4(),
            borrower: borrower.id,
            amount: 500.0,
            interest_rate: 6.0,
            period_months: 12,
            status: LoanStatus::Open,
            matched_with: None,
            borrower_accepted: false,
            lender_accepted: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        db.insert_loan(&loan).unwrap();
        loan
    }

    #[test]
    fn loan_round_trips_through_rows() {
        let db = Database::open_in_memory().unwrap();
        let b = seed_user(&db, Role::Borrower, true);
        let loan = seed_loan(&db, &b);

        let stored = db.get_loan(loan.id).unwrap().unwrap();
        assert_eq!(stored.id, loan.id);
        assert_eq!(stored.borrower, b.id);
        assert_eq!(stored.status, LoanStatus::Open);
        assert_eq!(stored.version, 0);
        assert!(db.get_loan(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn verified_lenders_come_back_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let l1 = seed_user(&db, Role::Lender, true);
        seed_user(&db, Role::Lender, false); // unverified, filtered out
        let l3 = seed_user(&db, Role::Lender, true);
        seed_user(&db, Role::Borrower, true); // wrong role

        let lenders = db.find_verified_lenders().unwrap();
        let ids: Vec<_> = lenders.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![l1.id, l3.id]);
    }

    #[test]
    fn cas_update_applies_once_and_only_once() {
        let db = Database::open_in_memory().unwrap();
        let b = seed_user(&db, Role::Borrower, true);
        let l = seed_user(&db, Role::Lender, true);
        let loan = seed_loan(&db, &b);

        let patch = LoanPatch {
            status: Some(LoanStatus::Matched),
            matched_with: Some(Some(l.id)),
            ..Default::default()
        };

        // First writer wins.
        let outcome = db.update_loan(loan.id, loan.version, &patch).unwrap();
        let updated = match outcome {
            UpdateOutcome::Updated(updated) => updated,
            other => panic!("expected update, got {other:?}"),
        };
        assert_eq!(updated.status, LoanStatus::Matched);
        assert_eq!(updated.matched_with, Some(l.id));
        assert_eq!(updated.version, loan.version + 1);

        // Second writer with the same snapshot loses, row untouched.
        let rival = seed_user(&db, Role::Lender, true);
        let rival_patch = LoanPatch {
            status: Some(LoanStatus::Matched),
            matched_with: Some(Some(rival.id)),
            ..Default::default()
        };
        assert!(matches!(
            db.update_loan(loan.id, loan.version, &rival_patch).unwrap(),
            UpdateOutcome::Stale
        ));
        let stored = db.get_loan(loan.id).unwrap().unwrap();
        assert_eq!(stored.matched_with, Some(l.id));
        assert_eq!(stored.version, loan.version + 1);
    }

    #[test]
    fn cas_on_missing_loan_reports_missing() {
        let db = Database::open_in_memory().unwrap();
        let patch = LoanPatch {
            status: Some(LoanStatus::Matched),
            ..Default::default()
        };
        assert!(matches!(
            db.update_loan(Uuid::new_v4(), 0, &patch).unwrap(),
            UpdateOutcome::Missing
        ));
    }

    #[test]
    fn clearing_matched_with_stores_null() {
        let db = Database::open_in_memory().unwrap();
        let b = seed_user(&db, Role::Borrower, true);
        let l = seed_user(&db, Role::Lender, true);
        let loan = seed_loan(&db, &b);

        let matched = match db
            .update_loan(
                loan.id,
                0,
                &LoanPatch {
                    status: Some(LoanStatus::Matched),
                    matched_with: Some(Some(l.id)),
                    borrower_accepted: Some(true),
                    ..Default::default()
                },
            )
            .unwrap()
        {
            UpdateOutcome::Updated(l) => l,
            other => panic!("expected update, got {other:?}"),
        };

        let reset = match db
            .update_loan(
                matched.id,
                matched.version,
                &LoanPatch {
                    status: Some(LoanStatus::Open),
                    matched_with: Some(None),
                    borrower_accepted: Some(false),
                    lender_accepted: Some(false),
                },
            )
            .unwrap()
        {
            UpdateOutcome::Updated(l) => l,
            other => panic!("expected update, got {other:?}"),
        };
        assert_eq!(reset.status, LoanStatus::Open);
        assert_eq!(reset.matched_with, None);
        assert!(!reset.borrower_accepted && !reset.lender_accepted);
    }

    #[test]
    fn predicate_queries_partition_loans() {
        let db = Database::open_in_memory().unwrap();
        let b = seed_user(&db, Role::Borrower, true);
        let l = seed_user(&db, Role::Lender, true);
        let open = seed_loan(&db, &b);
        let claimed = seed_loan(&db, &b);
        db.update_loan(
            claimed.id,
            0,
            &LoanPatch {
                status: Some(LoanStatus::Matched),
                matched_with: Some(Some(l.id)),
                ..Default::default()
            },
        )
        .unwrap();

        let open_ids: Vec<_> = db.open_loans().unwrap().iter().map(|l| l.id).collect();
        assert_eq!(open_ids, vec![open.id]);

        let by_borrower = db.loans_by_borrower(b.id).unwrap();
        assert_eq!(by_borrower.len(), 2);

        let by_lender: Vec<_> = db.loans_by_lender(l.id).unwrap().iter().map(|l| l.id).collect();
        assert_eq!(by_lender, vec![claimed.id]);

        assert_eq!(db.all_loans().unwrap().len(), 2);
    }

    #[test]
    fn kyc_flip_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, Role::Borrower, false);

        assert!(db.set_kyc_verified(u.id).unwrap());
        assert!(db.set_kyc_verified(u.id).unwrap());
        assert!(db.get_user(u.id).unwrap().unwrap().kyc.verified);

        assert!(!db.set_kyc_verified(Uuid::new_v4()).unwrap());
    }
}
