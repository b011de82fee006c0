use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role, fixed at registration. No operation changes a user's role
/// afterwards, so a lender can never silently become a borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Lender,
    Borrower,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Lender => "lender",
            Role::Borrower => "borrower",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "lender" => Ok(Role::Lender),
            "borrower" => Ok(Role::Borrower),
            other => Err(UnknownVariant("role", other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// KYC state on a user record. `verified` starts false and is flipped to
/// true only by an admin; it never reverts. The document fields are opaque
/// references (filenames or URLs) — the files themselves live elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Kyc {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhaar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_proof: Option<String>,
}

/// Funding terms a lender registers with: the largest principal they will
/// fund per loan, and the minimum rate they accept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LenderProfile {
    pub max_amount: f64,
    pub interest_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub kyc: Kyc,
    /// Present iff `role` is `Lender`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lender_profile: Option<LenderProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Loan lifecycle status. Defined transitions move open → matched →
/// accepted, with matched → open on rejection. `Rejected` and `AdminReview`
/// are legacy states: rows carrying them still parse, but no transition
/// produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Open,
    Matched,
    Accepted,
    Rejected,
    AdminReview,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Open => "open",
            LoanStatus::Matched => "matched",
            LoanStatus::Accepted => "accepted",
            LoanStatus::Rejected => "rejected",
            LoanStatus::AdminReview => "admin_review",
        }
    }
}

impl FromStr for LoanStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(LoanStatus::Open),
            "matched" => Ok(LoanStatus::Matched),
            "accepted" => Ok(LoanStatus::Accepted),
            "rejected" => Ok(LoanStatus::Rejected),
            "admin_review" => Ok(LoanStatus::AdminReview),
            other => Err(UnknownVariant("loan status", other.to_string())),
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: Uuid,
    /// The borrower who filed the request. Immutable.
    pub borrower: Uuid,
    pub amount: f64,
    /// The rate the borrower is offering to pay.
    pub interest_rate: f64,
    pub period_months: u32,
    pub status: LoanStatus,
    /// The lender currently paired with this loan. Set iff status is
    /// matched or accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_with: Option<Uuid>,
    pub borrower_accepted: bool,
    pub lender_accepted: bool,
    /// Optimistic-concurrency counter, bumped on every update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A party's answer to an active match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondAction {
    Accept,
    Reject,
}

/// Error for string → enum conversions out of the database.
#[derive(Debug)]
pub struct UnknownVariant(pub &'static str, pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.0, self.1)
    }
}

impl std::error::Error for UnknownVariant {}
