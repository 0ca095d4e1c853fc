//! Middleware and extractors.

pub mod auth;

pub use auth::{AUTH_COOKIE, Caller, clear_session_cookie, session_cookie};
