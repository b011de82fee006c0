//! Database row types — these map directly to SQLite rows.
//! Distinct from the peerlend-types domain models to keep the DB layer
//! independent; conversion lives next to the queries.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub kyc_verified: bool,
    pub kyc_pan: Option<String>,
    pub kyc_aadhaar: Option<String>,
    pub kyc_id_proof: Option<String>,
    pub max_amount: Option<f64>,
    pub interest_rate: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct LoanRow {
    pub id: String,
    pub borrower: String,
    pub amount: f64,
    pub interest_rate: f64,
    pub period_months: i64,
    pub status: String,
    pub matched_with: Option<String>,
    pub borrower_accepted: bool,
    pub lender_accepted: bool,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}
