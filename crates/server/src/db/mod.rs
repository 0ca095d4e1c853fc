//! Entity store for principals and deliveries.
//!
//! # Tables
//!
//! - `principal` - Admins and drivers (unique admin email, unique magic token)
//! - `delivery` - Delivery records (`assigned_driver_id` is `ON DELETE SET NULL`)
//! - `delivery_item` - Line items, cascading with their delivery
//!
//! Two backends implement the store traits: `PostgreSQL` through `sqlx` and an
//! in-memory store used by tests and local runs.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p handover-cli -- migrate
//! ```

pub mod deliveries;
pub mod memory;
pub mod principals;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use handover_core::{DeliveryId, DeliveryStatus, MagicToken, PrincipalId};

use crate::models::{Completion, Delivery, DeliveryFilter, NewDelivery, NewPrincipal, Principal};

pub use deliveries::PgDeliveryStore;
pub use memory::MemoryStore;
pub use principals::PgPrincipalStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A conditional update found the record in another status.
    #[error("record is {0}")]
    StaleState(DeliveryStatus),
}

/// Storage of admin and driver principals.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Find a principal by ID.
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, RepositoryError>;

    /// Find the admin principal with a matching email.
    async fn find_admin_by_email(
        &self,
        email: &handover_core::Email,
    ) -> Result<Option<Principal>, RepositoryError>;

    /// Find the driver holding `token`.
    async fn find_driver_by_magic_token(
        &self,
        token: &MagicToken,
    ) -> Result<Option<Principal>, RepositoryError>;

    /// All drivers ordered by name ascending.
    async fn list_drivers(&self) -> Result<Vec<Principal>, RepositoryError>;

    /// Create a principal.
    ///
    /// Returns `RepositoryError::Conflict` when the email or magic token is
    /// already taken.
    async fn create(&self, new: NewPrincipal) -> Result<Principal, RepositoryError>;

    /// Replace or clear a driver's magic token.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown driver and
    /// `RepositoryError::Conflict` when the token is already taken.
    async fn set_magic_token(
        &self,
        id: PrincipalId,
        token: Option<&MagicToken>,
    ) -> Result<(), RepositoryError>;
}

/// Storage of deliveries and their items.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Create a pending delivery together with its items, atomically.
    async fn create(&self, new: NewDelivery) -> Result<Delivery, RepositoryError>;

    /// Find a delivery with its items.
    async fn find_by_id(&self, id: DeliveryId) -> Result<Option<Delivery>, RepositoryError>;

    /// Deliveries matching `filter`, newest first.
    async fn list(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>, RepositoryError>;

    /// Set or clear the assigned driver while the delivery is pending.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown delivery and
    /// `RepositoryError::StaleState` when it is no longer pending.
    async fn assign_driver(
        &self,
        id: DeliveryId,
        driver: Option<PrincipalId>,
    ) -> Result<Delivery, RepositoryError>;

    /// Apply item quantities and flip the delivery to delivered in one
    /// transaction, conditional on it still being pending.
    ///
    /// On any error nothing is applied.
    async fn complete(
        &self,
        id: DeliveryId,
        completion: &Completion,
    ) -> Result<Delivery, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
