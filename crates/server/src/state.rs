//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::db::{self, DeliveryStore, MemoryStore, PgDeliveryStore, PgPrincipalStore, PrincipalStore};
use crate::services::{
    BootstrapService, CredentialIssuer, DeliveryService, DirectoryService, MagicLinkRegistry,
};
use crate::storage::{BlobStore, LocalBlobStore, MemoryBlobStore, StorageError};

/// Errors that can occur while building the application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    principals: Arc<dyn PrincipalStore>,
    deliveries: Arc<dyn DeliveryStore>,
    blobs: Arc<dyn BlobStore>,
    credentials: CredentialIssuer,
    pool: Option<PgPool>,
}

impl AppState {
    /// Build state from explicit store implementations.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        principals: Arc<dyn PrincipalStore>,
        deliveries: Arc<dyn DeliveryStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self::build(config, principals, deliveries, blobs, None)
    }

    /// State backed by `PostgreSQL` and the filesystem blob store.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the database is unreachable or the upload
    /// directory cannot be created.
    pub async fn postgres(config: ServerConfig) -> Result<Self, StateError> {
        let pool = db::create_pool(&config.database_url).await?;
        tracing::info!("Database pool created");
        let blobs = LocalBlobStore::new(&config.upload_dir).await?;

        Ok(Self::build(
            config,
            Arc::new(PgPrincipalStore::new(pool.clone())),
            Arc::new(PgDeliveryStore::new(pool.clone())),
            Arc::new(blobs),
            Some(pool),
        ))
    }

    /// State held entirely in memory.
    #[must_use]
    pub fn in_memory(config: ServerConfig) -> Self {
        let store = MemoryStore::new();
        Self::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    fn build(
        config: ServerConfig,
        principals: Arc<dyn PrincipalStore>,
        deliveries: Arc<dyn DeliveryStore>,
        blobs: Arc<dyn BlobStore>,
        pool: Option<PgPool>,
    ) -> Self {
        let credentials = CredentialIssuer::new(&config.jwt_secret);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                principals,
                deliveries,
                blobs,
                credentials,
                pool,
            }),
        }
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get the credential issuer.
    #[must_use]
    pub fn credentials(&self) -> &CredentialIssuer {
        &self.inner.credentials
    }

    /// Get the database pool, when backed by `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Delivery lifecycle service.
    #[must_use]
    pub fn deliveries(&self) -> DeliveryService<'_> {
        DeliveryService::new(
            self.inner.principals.as_ref(),
            self.inner.deliveries.as_ref(),
            self.inner.blobs.as_ref(),
        )
    }

    /// Identity directory service.
    #[must_use]
    pub fn directory(&self) -> DirectoryService<'_> {
        DirectoryService::new(self.inner.principals.as_ref(), &self.inner.config.base_url)
    }

    /// Magic link registry.
    #[must_use]
    pub fn magic_links(&self) -> MagicLinkRegistry<'_> {
        MagicLinkRegistry::new(self.inner.principals.as_ref(), &self.inner.config.base_url)
    }

    /// Bootstrap service.
    #[must_use]
    pub fn bootstrap(&self) -> BootstrapService<'_> {
        BootstrapService::new(
            self.inner.principals.as_ref(),
            self.inner.deliveries.as_ref(),
            &self.inner.config.base_url,
        )
    }
}
