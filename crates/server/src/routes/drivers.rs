//! Driver management handlers (admin).

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};
use serde::Deserialize;

use handover_core::Role;

use crate::error::AppError;
use crate::middleware::Caller;
use crate::services::{CreatedDriver, DriverListing, Requirement, Scope, authorize};
use crate::state::AppState;

/// Build the drivers router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/drivers", get(list_drivers).post(create_driver))
}

/// Request for creating a driver.
#[derive(Debug, Default, Deserialize)]
pub struct CreateDriverRequest {
    pub name: Option<String>,
    pub notes: Option<String>,
}

/// Create a driver and return its magic link.
///
/// # Errors
///
/// Returns 401/403 for non-admins and 400 for a malformed body. An absent
/// body creates an unnamed driver.
pub async fn create_driver(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Option<Json<CreateDriverRequest>>, JsonRejection>,
) -> Result<Json<CreatedDriver>, AppError> {
    authorize(caller.claims(), Requirement::Role(Role::Admin), Scope::Unscoped)?;
    let Json(body) = body?.unwrap_or_default();
    let created = state
        .directory()
        .create_driver(caller.claims(), body.name, body.notes)
        .await?;
    Ok(Json(created))
}

/// List all drivers.
///
/// # Errors
///
/// Returns 401/403 for non-admins.
pub async fn list_drivers(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<DriverListing>>, AppError> {
    Ok(Json(state.directory().list_drivers(caller.claims()).await?))
}
