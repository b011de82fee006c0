use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use peerlend_core::lifecycle::{self, NewLoan};
use peerlend_types::api::{CreateLoanRequest, CreateLoanResponse, RespondRequest, UserSummary};
use peerlend_types::models::User;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};

/// POST /api/loans — borrower files a request; the matching engine runs
/// before the response goes out so the caller learns about an instant match.
pub async fn create_loan(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Json(req): Json<CreateLoanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = NewLoan {
        amount: req.amount,
        interest_rate: req.interest_rate,
        period_months: req.period_months,
    };

    let response = run_blocking(move || {
        let created = lifecycle::create_loan(&state.db, &actor, input)?;
        let loan = lifecycle::view_loan(&state.db, &created.loan)?;
        Ok(CreateLoanResponse {
            loan,
            matched: created.matched.as_ref().map(UserSummary::from),
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/loans/open — lender browses requests awaiting a match.
pub async fn open_loans(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let views = run_blocking(move || lifecycle::open_loans(&state.db, &actor)).await?;
    Ok(Json(views))
}

/// POST /api/loans/{id}/interest — lender claims an open loan.
pub async fn express_interest(
    State(state): State<AppState>,
    Path(loan_id): Path<Uuid>,
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let view = run_blocking(move || {
        let updated = lifecycle::express_interest(&state.db, &actor, loan_id)?;
        lifecycle::view_loan(&state.db, &updated)
    })
    .await?;
    Ok(Json(view))
}

/// POST /api/loans/{id}/respond — either side accepts or rejects the match.
pub async fn respond(
    State(state): State<AppState>,
    Path(loan_id): Path<Uuid>,
    Extension(actor): Extension<User>,
    Json(req): Json<RespondRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = run_blocking(move || {
        let updated = lifecycle::respond(&state.db, &actor, loan_id, req.action)?;
        lifecycle::view_loan(&state.db, &updated)
    })
    .await?;
    Ok(Json(view))
}

/// GET /api/loans/borrower/{user_id} — loans a user has requested.
pub async fn by_borrower(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let views =
        run_blocking(move || lifecycle::loans_by_borrower(&state.db, &actor, user_id)).await?;
    Ok(Json(views))
}

/// GET /api/loans/lender/{user_id} — loans a user holds as lender.
pub async fn by_lender(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(actor): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let views =
        run_blocking(move || lifecycle::loans_by_lender(&state.db, &actor, user_id)).await?;
    Ok(Json(views))
}
