//! Integration test support for Handover.
//!
//! # Running Tests
//!
//! ```bash
//! # Router and service tests (in-memory store)
//! cargo test -p handover-integration-tests
//!
//! # PostgreSQL store tests
//! DATABASE_URL=postgres://... cargo test -p handover-integration-tests -- --ignored
//! ```
//!
//! [`TestApp`] drives the real router in process with `tower::ServiceExt`,
//! backed by the in-memory principal, delivery and blob stores.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use handover_core::Email;
use handover_server::config::{AdminBootstrapConfig, ServerConfig};
use handover_server::routes;
use handover_server::state::AppState;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const JWT_SECRET: &str = "q8T#vL2m!Xr9$Kp4@Wn7&Zc1^Hd6*Bf3";
pub const BASE_URL: &str = "http://localhost:3000";

/// A one-pixel-ish PNG signature as a data URL.
pub const SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUg==";

/// Configuration for tests; never touches the environment.
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://unused"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: BASE_URL.to_string(),
        jwt_secret: SecretString::from(JWT_SECRET),
        admin: AdminBootstrapConfig {
            email: Email::parse(ADMIN_EMAIL).unwrap(),
            password: SecretString::from(ADMIN_PASSWORD),
        },
        production: false,
        seed_demo: false,
        upload_dir: PathBuf::from("unused"),
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Parse the body as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// The body as text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The `name=value` pair of the session cookie set by this response.
    #[must_use]
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("authToken="))
            .and_then(|v| v.split(';').next())
            .map(str::to_owned)
    }
}

/// Multipart body builder.
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: "handover-test-boundary".to_string(),
            bytes: Vec::new(),
        }
    }

    /// Add a text part.
    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n",
            self.boundary
        );
        self.bytes.extend_from_slice(head.as_bytes());
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    /// Add a file part.
    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
            self.boundary
        );
        self.bytes.extend_from_slice(head.as_bytes());
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        let tail = format!("--{}--\r\n", self.boundary);
        self.bytes.extend_from_slice(tail.as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.bytes,
        )
    }
}

/// The application router over in-memory stores.
#[derive(Clone)]
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let state = AppState::in_memory(test_config());
        let router = routes::app(state.clone());
        Self { state, router }
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        self.send(build(Method::GET, path, cookie, None, Body::empty()))
            .await
    }

    pub async fn post_json(&self, path: &str, cookie: Option<&str>, body: &Value) -> TestResponse {
        self.send(build(
            Method::POST,
            path,
            cookie,
            Some("application/json"),
            Body::from(body.to_string()),
        ))
        .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        cookie: Option<&str>,
        form: MultipartBody,
    ) -> TestResponse {
        let (content_type, bytes) = form.finish();
        self.send(build(
            Method::POST,
            path,
            cookie,
            Some(&content_type),
            Body::from(bytes),
        ))
        .await
    }

    /// Log in as the configured admin and return the cookie pair.
    pub async fn admin_cookie(&self) -> String {
        let response = self
            .post_json(
                "/auth/login",
                None,
                &serde_json::json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response.session_cookie().unwrap()
    }

    /// Create a driver as admin; returns the response body.
    pub async fn create_driver(&self, admin: &str, name: &str) -> Value {
        let response = self
            .post_json(
                "/api/drivers",
                Some(admin),
                &serde_json::json!({ "name": name }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response.json()
    }

    /// Sign in through a magic link token and return the cookie pair.
    pub async fn driver_cookie(&self, token: &str) -> String {
        let response = self.get(&format!("/magic-login/{token}"), None).await;
        assert!(response.status.is_redirection(), "{}", response.status);
        response.session_cookie().unwrap()
    }

    /// Create a delivery as admin; returns the response body.
    pub async fn create_delivery(&self, admin: &str, body: &Value) -> Value {
        let response = self.post_json("/api/invoices", Some(admin), body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()
    }
}

fn build(
    method: Method,
    path: &str,
    cookie: Option<&str>,
    content_type: Option<&str>,
    body: Body,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body).unwrap()
}
