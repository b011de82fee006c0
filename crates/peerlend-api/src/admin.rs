use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use peerlend_core::lifecycle;
use peerlend_types::models::User;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};

/// GET /api/admin/requests — every loan on the books.
pub async fn all_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let views = run_blocking(move || lifecycle::all_loans(&state.db, &actor)).await?;
    Ok(Json(views))
}

/// POST /api/admin/kyc/{user_id}/verify — flip a user's KYC flag.
pub async fn verify_kyc(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || lifecycle::verify_kyc(&state.db, &actor, user_id)).await?;
    Ok(Json(serde_json::json!({ "verified": true })))
}
