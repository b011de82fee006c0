use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use peerlend_api::auth::{self, AppState, AppStateInner};
use peerlend_api::middleware::require_auth;
use peerlend_api::{admin, loans, profile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peerlend=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PEERLEND_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PEERLEND_DB_PATH").unwrap_or_else(|_| "peerlend.db".into());
    let host = std::env::var("PEERLEND_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PEERLEND_PORT")
        .unwrap_or_else(|_| "5000".into())
        .parse()?;

    // Init database
    let db = peerlend_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    // Routes
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/api/loans", post(loans::create_loan))
        .route("/api/loans/open", get(loans::open_loans))
        .route("/api/loans/{id}/interest", post(loans::express_interest))
        .route("/api/loans/{id}/respond", post(loans::respond))
        .route("/api/loans/borrower/{user_id}", get(loans::by_borrower))
        .route("/api/loans/lender/{user_id}", get(loans::by_lender))
        .route("/api/admin/requests", get(admin::all_requests))
        .route("/api/admin/kyc/{user_id}/verify", post(admin::verify_kyc))
        .route("/api/profile", get(profile::get_profile))
        .route("/api/profile", put(profile::update_profile))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("peerlend server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
