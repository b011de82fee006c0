use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;

use peerlend_types::models::{Kyc, LenderProfile, LoanRequest, Role, User};

use crate::Database;
use crate::models::{LoanRow, UserRow};

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &User, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, role, kyc_verified,
                                    kyc_pan, kyc_aadhaar, kyc_id_proof, max_amount, interest_rate)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    password_hash,
                    user.role.as_str(),
                    user.kyc.verified,
                    user.kyc.pan,
                    user.kyc.aadhaar,
                    user.kyc.id_proof,
                    user.lender_profile.map(|p| p.max_amount),
                    user.lender_profile.map(|p| p.interest_rate),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_row_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT * FROM users WHERE email = ?1", [email])
        })
    }

    pub fn get_user_row_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "SELECT * FROM users WHERE id = ?1", [id]))
    }

    /// Update mutable profile fields. Absent values keep the stored ones.
    /// Returns false when no such user.
    pub fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        max_amount: Option<f64>,
        interest_rate: Option<f64>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users
                 SET name = COALESCE(?2, name),
                     max_amount = COALESCE(?3, max_amount),
                     interest_rate = COALESCE(?4, interest_rate),
                     updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![id, name, max_amount, interest_rate],
            )?;
            Ok(affected > 0)
        })
    }
}

fn query_user<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;

    let row = stmt
        .query_row(params, |row| {
            Ok(UserRow {
                id: row.get("id")?,
                name: row.get("name")?,
                email: row.get("email")?,
                password: row.get("password")?,
                role: row.get("role")?,
                kyc_verified: row.get("kyc_verified")?,
                kyc_pan: row.get("kyc_pan")?,
                kyc_aadhaar: row.get("kyc_aadhaar")?,
                kyc_id_proof: row.get("kyc_id_proof")?,
                max_amount: row.get("max_amount")?,
                interest_rate: row.get("interest_rate")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn query_users<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(UserRow {
                id: row.get("id")?,
                name: row.get("name")?,
                email: row.get("email")?,
                password: row.get("password")?,
                role: row.get("role")?,
                kyc_verified: row.get("kyc_verified")?,
                kyc_pan: row.get("kyc_pan")?,
                kyc_aadhaar: row.get("kyc_aadhaar")?,
                kyc_id_proof: row.get("kyc_id_proof")?,
                max_amount: row.get("max_amount")?,
                interest_rate: row.get("interest_rate")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub(crate) fn query_loan_by_id(conn: &Connection, id: &str) -> Result<Option<LoanRow>> {
    let mut stmt = conn.prepare("SELECT * FROM loans WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(LoanRow {
                id: row.get("id")?,
                borrower: row.get("borrower")?,
                amount: row.get("amount")?,
                interest_rate: row.get("interest_rate")?,
                period_months: row.get("period_months")?,
                status: row.get("status")?,
                matched_with: row.get("matched_with")?,
                borrower_accepted: row.get("borrower_accepted")?,
                lender_accepted: row.get("lender_accepted")?,
                version: row.get("version")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn query_loans<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<LoanRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(LoanRow {
                id: row.get("id")?,
                borrower: row.get("borrower")?,
                amount: row.get("amount")?,
                interest_rate: row.get("interest_rate")?,
                period_months: row.get("period_months")?,
                status: row.get("status")?,
                matched_with: row.get("matched_with")?,
                borrower_accepted: row.get("borrower_accepted")?,
                lender_accepted: row.get("lender_accepted")?,
                version: row.get("version")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Row → domain conversion --

/// SQLite defaults store "YYYY-MM-DD HH:MM:SS"; rows written from domain
/// values carry RFC 3339. Accept both.
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("bad timestamp '{}': {}", s, e))
}

pub(crate) fn user_from_row(row: UserRow) -> Result<User> {
    let role: Role = row.role.parse().map_err(anyhow::Error::new)?;
    let lender_profile = match (role, row.max_amount, row.interest_rate) {
        (Role::Lender, Some(max_amount), Some(interest_rate)) => Some(LenderProfile {
            max_amount,
            interest_rate,
        }),
        _ => None,
    };

    Ok(User {
        id: row.id.parse()?,
        name: row.name,
        email: row.email,
        role,
        kyc: Kyc {
            verified: row.kyc_verified,
            pan: row.kyc_pan,
            aadhaar: row.kyc_aadhaar,
            id_proof: row.kyc_id_proof,
        },
        lender_profile,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

pub(crate) fn loan_from_row(row: LoanRow) -> Result<LoanRequest> {
    Ok(LoanRequest {
        id: row.id.parse()?,
        borrower: row.borrower.parse()?,
        amount: row.amount,
        interest_rate: row.interest_rate,
        period_months: u32::try_from(row.period_months)?,
        status: row.status.parse().map_err(anyhow::Error::new)?,
        matched_with: row.matched_with.map(|s| s.parse()).transpose()?,
        borrower_accepted: row.borrower_accepted,
        lender_accepted: row.lender_accepted,
        version: row.version,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
