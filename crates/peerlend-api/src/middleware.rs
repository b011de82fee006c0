use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use peerlend_core::LendingError;
use peerlend_core::store::IdentityDirectory;
use peerlend_types::api::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};

/// Validate the bearer token, then resolve the full user record so every
/// handler (and the core beneath it) works with a live actor, not just
/// claims. A token whose user has vanished is treated as invalid.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError(LendingError::Unauthorized))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError(LendingError::Unauthorized))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError(LendingError::Unauthorized))?;

    let user_id = token_data.claims.sub;
    let app = state.clone();
    let actor = run_blocking(move || Ok(app.db.get_user(user_id)?))
        .await?
        .ok_or(ApiError(LendingError::Unauthorized))?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
