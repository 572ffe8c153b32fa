//! HTTP route handlers for the checkout service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health           - Liveness check
//! GET  /health/ready     - Readiness check (verifies database connectivity)
//!
//! # Checkout
//! POST /api/checkout     - Run the order-intake pipeline
//! OPTIONS /api/checkout  - CORS preflight (answered by the CORS layer)
//! ```

pub mod checkout;

use axum::http::{Method, StatusCode, header};
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the checkout API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/checkout", post(checkout::create))
}

/// Build the full application router: API routes, health endpoints, CORS,
/// and request tracing.
///
/// The checkout endpoint is called cross-origin from campaign sites, so the
/// CORS policy is permissive: any origin, `authorization` and
/// `content-type` request headers.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
