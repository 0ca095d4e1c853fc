//! Authentication route handlers.
//!
//! Admins sign in with the configured email and password; drivers sign in by
//! opening their magic link. Both receive the same session cookie.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use handover_core::{PrincipalId, Role};

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::middleware::{Caller, clear_session_cookie, session_cookie};
use crate::models::Profile;
use crate::services::{Requirement, Scope, authorize, secrets_match};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_LINK: &str = "Invalid or expired link";

const DRIVER_HOME: &str = "<!DOCTYPE html><html><head><title>Driver</title></head>\
<body><h2>Welcome Driver</h2>\
<p><a href=\"/my-deliveries\">View My Deliveries</a></p></body></html>";

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/magic-login/{token}", get(magic_login))
        .route("/driver-home", get(driver_home))
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Signed-in admin.
#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: PrincipalId,
    pub role: Role,
    pub email: String,
}

/// Admin email/password login.
///
/// # Errors
///
/// Returns 400 for a malformed body and 401 with a generic message for any
/// email or password mismatch.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;
    let config = state.config();
    let email_ok = config.admin.email.matches(&body.email);
    let password_ok = secrets_match(&config.jwt_secret, &body.password, &config.admin.password);
    if !(email_ok && password_ok) {
        tracing::info!("Admin login rejected");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let admin = state.bootstrap().ensure_admin(&config.admin.email).await?;
    let token = state
        .credentials()
        .issue(admin.id, admin.role)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(principal_id = %admin.id, "Admin signed in");
    let user = LoginUser {
        id: admin.id,
        role: admin.role,
        email: config.admin.email.to_string(),
    };
    Ok((
        [(header::SET_COOKIE, session_cookie(&token, config.secure_cookies()))],
        Json(json!({ "user": user })),
    )
        .into_response())
}

/// The caller's profile.
///
/// # Errors
///
/// Returns 401 without a valid credential and 404 if the principal is gone.
pub async fn me(State(state): State<AppState>, caller: Caller) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.directory().me(caller.claims()).await?))
}

/// Clear the session cookie. Always succeeds.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::SET_COOKIE,
            clear_session_cookie(state.config().secure_cookies()),
        )],
        Json(json!({ "ok": true })),
    )
}

/// Exchange a magic link for a session and redirect to the driver page.
///
/// # Errors
///
/// Returns 500 if the lookup or signing fails. Unknown tokens get a plain
/// 404 page rather than a JSON error.
pub async fn magic_login(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let driver = match state.magic_links().resolve(&token).await {
        Ok(driver) => driver,
        Err(RepositoryError::NotFound) => {
            tracing::info!("Magic link rejected");
            return Ok((StatusCode::NOT_FOUND, INVALID_LINK).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let credential = state
        .credentials()
        .issue(driver.id, driver.role)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(principal_id = %driver.id, "Driver signed in via magic link");
    Ok((
        [(
            header::SET_COOKIE,
            session_cookie(&credential, state.config().secure_cookies()),
        )],
        Redirect::to("/driver-home"),
    )
        .into_response())
}

/// Driver landing page.
///
/// # Errors
///
/// Returns 401 or 403 for callers without the driver role.
pub async fn driver_home(caller: Caller) -> Result<Html<&'static str>, AppError> {
    authorize(caller.claims(), Requirement::Role(Role::Driver), Scope::Unscoped)?;
    Ok(Html(DRIVER_HOME))
}
