//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Liveness check
//! GET  /health/ready                  - Readiness check (database)
//!
//! # Auth
//! POST /auth/login                - Admin email/password login
//! GET  /auth/me                   - Caller's profile
//! POST /auth/logout               - Clear the session cookie
//! GET  /magic-login/{token}           - Driver magic link sign-in
//! GET  /driver-home                   - Driver landing page
//!
//! # Drivers (admin)
//! POST /api/drivers                   - Create driver with magic link
//! GET  /api/drivers                   - List drivers
//!
//! # Invoices (admin)
//! POST /api/invoices                  - Create delivery from JSON
//! POST /api/invoices/upload           - Create delivery from multipart with invoice file
//!
//! # Deliveries
//! GET  /api/deliveries                - List (?status=&driverId=)
//! GET  /api/deliveries/{id}           - Detail with assigned driver
//! POST /api/deliveries/{id}/assign    - Set or clear driver (admin)
//! POST /api/deliveries/{id}/confirm   - Confirm with evidence (driver)
//! GET  /my-deliveries                 - Caller's assigned deliveries (driver)
//! ```

pub mod auth;
pub mod deliveries;
pub mod drivers;
mod form;
pub mod invoices;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::get,
};

use crate::state::AppState;

/// Maximum accepted request body (uploads included).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(drivers::router())
        .merge(invoices::router())
        .merge(deliveries::router())
}

/// Build the application with health checks and state applied.
///
/// Tracing and Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
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
/// Verifies database connectivity when backed by `PostgreSQL`.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
