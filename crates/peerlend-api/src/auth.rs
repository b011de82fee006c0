use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use peerlend_core::LendingError;
use peerlend_db::Database;
use peerlend_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};
use peerlend_types::models::{Kyc, LenderProfile, Role, User};

use crate::error::{ApiError, run_blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(validation("name is required"));
    }
    if !req.email.contains('@') {
        return Err(validation("a valid email is required"));
    }
    if req.password.len() < 8 {
        return Err(validation("password must be at least 8 characters"));
    }

    let lender_profile = match req.role {
        Role::Lender => {
            let (Some(max_amount), Some(interest_rate)) = (req.max_amount, req.interest_rate)
            else {
                return Err(validation(
                    "lender registration requires max_amount and interest_rate",
                ));
            };
            if !max_amount.is_finite() || max_amount < 0.0 {
                return Err(validation("max_amount must be zero or positive"));
            }
            if !interest_rate.is_finite() || interest_rate < 0.0 {
                return Err(validation("interest_rate must be zero or positive"));
            }
            Some(LenderProfile {
                max_amount,
                interest_rate,
            })
        }
        _ => None,
    };

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| internal(anyhow::anyhow!("password hash: {e}")))?
        .to_string();

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        email: req.email.to_lowercase(),
        role: req.role,
        kyc: Kyc {
            verified: false,
            pan: req.pan,
            aadhaar: req.aadhaar,
            id_proof: req.id_proof,
        },
        lender_profile,
        created_at: now,
        updated_at: now,
    };

    let app = state.clone();
    let (user_id, role) = run_blocking(move || {
        if app.db.get_user_row_by_email(&user.email)?.is_some() {
            return Err(LendingError::Conflict("email already registered"));
        }
        app.db.create_user(&user, &password_hash)?;
        info!(user = %user.id, role = %user.role, "user registered");
        Ok((user.id, user.role))
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, role)
        .map_err(internal)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.to_lowercase();
    let app = state.clone();
    let row = run_blocking(move || Ok(app.db.get_user_row_by_email(&email)?))
        .await?
        .ok_or(ApiError(LendingError::Unauthorized))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&row.password)
        .map_err(|e| internal(anyhow::anyhow!("stored hash unparseable: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError(LendingError::Unauthorized))?;

    let user_id: Uuid = row
        .id
        .parse()
        .map_err(|e| internal(anyhow::anyhow!("corrupt user id: {e}")))?;
    let role: Role = row
        .role
        .parse()
        .map_err(|e| internal(anyhow::Error::new(e)))?;

    let token = create_token(&state.jwt_secret, user_id, role).map_err(internal)?;

    Ok(Json(LoginResponse {
        user_id,
        name: row.name,
        role,
        token,
    }))
}

fn create_token(secret: &str, user_id: Uuid, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        role,
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn validation(msg: &str) -> ApiError {
    ApiError(LendingError::ValidationFailed(msg.to_string()))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError(LendingError::Store(err))
}
