use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Kyc, LenderProfile, LoanRequest, LoanStatus, RespondAction, Role, User};

// -- JWT Claims --

/// Bearer-token claims. Canonical definition lives here so the api
/// middleware and any future gateway agree on the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Opaque KYC document references captured at signup.
    pub pan: Option<String>,
    pub aadhaar: Option<String>,
    pub id_proof: Option<String>,
    /// Required when registering as a lender.
    pub max_amount: Option<f64>,
    pub interest_rate: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub token: String,
}

// -- Loans --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLoanRequest {
    pub amount: f64,
    pub interest_rate: f64,
    pub period_months: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondRequest {
    pub action: RespondAction,
}

/// Slim user record embedded in loan views in place of a bare id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// A loan as surfaced to clients: party references resolved to summaries.
#[derive(Debug, Clone, Serialize)]
pub struct LoanView {
    pub id: Uuid,
    pub borrower: UserSummary,
    pub amount: f64,
    pub interest_rate: f64,
    pub period_months: u32,
    pub status: LoanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_with: Option<UserSummary>,
    pub borrower_accepted: bool,
    pub lender_accepted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanView {
    pub fn new(
        loan: &LoanRequest,
        borrower: UserSummary,
        matched_with: Option<UserSummary>,
    ) -> Self {
        Self {
            id: loan.id,
            borrower,
            amount: loan.amount,
            interest_rate: loan.interest_rate,
            period_months: loan.period_months,
            status: loan.status,
            matched_with,
            borrower_accepted: loan.borrower_accepted,
            lender_accepted: loan.lender_accepted,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateLoanResponse {
    pub loan: LoanView,
    /// Populated when the matching engine paired the new loan automatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<UserSummary>,
}

// -- Profile --

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub kyc: Kyc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lender_profile: Option<LenderProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            kyc: user.kyc,
            lender_profile: user.lender_profile,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    /// Lender-only funding term updates.
    pub max_amount: Option<f64>,
    pub interest_rate: Option<f64>,
}
