//! Credential extraction and the session cookie.
//!
//! A request carries its credential either in the `authToken` cookie or in an
//! `Authorization: Bearer` header. The [`Caller`] extractor verifies it and
//! never rejects: handlers pass the optional claims to the services, which
//! decide through the authorization guard.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
};

use crate::error::set_sentry_user;
use crate::services::Claims;
use crate::services::credentials::CREDENTIAL_VALIDITY_SECS;
use crate::state::AppState;

/// Name of the session cookie.
pub const AUTH_COOKIE: &str = "authToken";

/// The verified caller of a request, if any.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(State(state): State<AppState>, caller: Caller) -> Result<Json<Profile>, AppError> {
///     Ok(Json(state.directory().me(caller.claims()).await?))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Claims>);

impl Caller {
    /// The verified claims, if the request carried a valid credential.
    #[must_use]
    pub const fn claims(&self) -> Option<&Claims> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = credential_from_headers(&parts.headers) else {
            return Ok(Self(None));
        };

        let claims = state.credentials().verify(&token).ok();
        if let Some(claims) = &claims {
            set_sentry_user(&claims.sub.to_string(), claims.role.as_str());
        }
        Ok(Self(claims))
    }
}

/// Find the credential in the `Authorization` header or the session cookie.
fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_owned())
        .filter(|t| !t.is_empty())
}

/// `Set-Cookie` value carrying a credential.
#[must_use]
pub fn session_cookie(token: &str, secure: bool) -> HeaderValue {
    cookie_value(token, CREDENTIAL_VALIDITY_SECS, secure)
}

/// `Set-Cookie` value that clears the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    cookie_value("", 0, secure)
}

fn cookie_value(value: &str, max_age: i64, secure: bool) -> HeaderValue {
    let mut cookie =
        format!("{AUTH_COOKIE}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    // Tokens are base64url and dot separated, so the value is always valid.
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}
