use axum::{Extension, Json, extract::State, response::IntoResponse};

use peerlend_core::LendingError;
use peerlend_core::store::IdentityDirectory;
use peerlend_types::api::{ProfileResponse, UpdateProfileRequest};
use peerlend_types::models::{Role, User};

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};

/// GET /api/profile — the actor's own record. The password hash never
/// appears in the domain model, so there is nothing to redact here.
pub async fn get_profile(
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ProfileResponse::from(actor)))
}

/// PUT /api/profile — update the display name, and for lenders the funding
/// terms. Role and KYC status are not touchable from here.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError(LendingError::ValidationFailed(
                "name cannot be empty".into(),
            )));
        }
    }
    for (field, value) in [
        ("max_amount", req.max_amount),
        ("interest_rate", req.interest_rate),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(ApiError(LendingError::ValidationFailed(format!(
                    "{field} must be zero or positive"
                ))));
            }
        }
    }

    // Funding terms only apply to lenders; for everyone else they are
    // ignored, mirroring the name-only update path.
    let (max_amount, interest_rate) = if actor.role == Role::Lender {
        (req.max_amount, req.interest_rate)
    } else {
        (None, None)
    };

    let updated = run_blocking(move || {
        let applied = state.db.update_profile(
            &actor.id.to_string(),
            req.name.as_deref().map(str::trim),
            max_amount,
            interest_rate,
        )?;
        if !applied {
            return Err(LendingError::NotFound("user"));
        }
        state
            .db
            .get_user(actor.id)?
            .ok_or(LendingError::NotFound("user"))
    })
    .await?;

    Ok(Json(ProfileResponse::from(updated)))
}
