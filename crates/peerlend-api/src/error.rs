use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use tracing::error;

use peerlend_core::LendingError;

/// HTTP-facing wrapper around the core failure taxonomy.
#[derive(Debug)]
pub struct ApiError(pub LendingError);

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LendingError::Unauthorized => StatusCode::UNAUTHORIZED,
            LendingError::Forbidden(_) => StatusCode::FORBIDDEN,
            LendingError::NotFound(_) => StatusCode::NOT_FOUND,
            LendingError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            LendingError::Conflict(_) => StatusCode::CONFLICT,
            LendingError::Store(e) => {
                error!("store failure: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // Store causes stay in the log, not on the wire.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Run sync core/db work off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, LendingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError(LendingError::Store(anyhow::anyhow!("background task failed")))
        })?
        .map_err(ApiError)
}
