//! Identity directory: driver management and principal profiles.

use serde::Serialize;
use tracing::instrument;

use handover_core::{PrincipalId, Role};

use super::credentials::Claims;
use super::error::ServiceError;
use super::guard::{Requirement, Scope, authorize};
use super::magic_link::{MagicLinkRegistry, link_url};
use crate::db::PrincipalStore;
use crate::models::Profile;

/// A newly created driver and its magic link.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDriver {
    pub id: PrincipalId,
    pub role: Role,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub magic_token: String,
    pub magic_link: String,
}

/// A driver as listed for admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverListing {
    pub id: PrincipalId,
    pub role: Role,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Current magic link, if the driver has one.
    pub magic_link: Option<String>,
}

/// Identity directory service.
pub struct DirectoryService<'a> {
    principals: &'a dyn PrincipalStore,
    base_url: &'a str,
}

impl<'a> DirectoryService<'a> {
    /// Create a new directory service.
    #[must_use]
    pub const fn new(principals: &'a dyn PrincipalStore, base_url: &'a str) -> Self {
        Self {
            principals,
            base_url,
        }
    }

    /// Create a driver and register its magic link (admin).
    ///
    /// # Errors
    ///
    /// Returns the guard's denial or a repository error.
    #[instrument(skip_all)]
    pub async fn create_driver(
        &self,
        caller: Option<&Claims>,
        name: Option<String>,
        notes: Option<String>,
    ) -> Result<CreatedDriver, ServiceError> {
        authorize(caller, Requirement::Role(Role::Admin), Scope::Unscoped)?;
        self.provision_driver(name, notes).await
    }

    /// Create a driver and its magic link without an authorization check.
    ///
    /// For trusted local callers: the demo seed and the CLI.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the driver cannot be stored; no driver
    /// is left behind in that case.
    pub async fn provision_driver(
        &self,
        name: Option<String>,
        notes: Option<String>,
    ) -> Result<CreatedDriver, ServiceError> {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
        let (driver, link) = MagicLinkRegistry::new(self.principals, self.base_url)
            .enroll(clean(name), clean(notes))
            .await?;

        tracing::info!(driver_id = %driver.id, "Driver created");
        Ok(CreatedDriver {
            id: driver.id,
            role: driver.role,
            name: driver.name,
            notes: driver.notes,
            magic_token: link.token.expose().to_owned(),
            magic_link: link.url,
        })
    }

    /// All drivers ordered by name (admin).
    ///
    /// # Errors
    ///
    /// Returns the guard's denial or a repository error.
    pub async fn list_drivers(
        &self,
        caller: Option<&Claims>,
    ) -> Result<Vec<DriverListing>, ServiceError> {
        authorize(caller, Requirement::Role(Role::Admin), Scope::Unscoped)?;
        let drivers = self.principals.list_drivers().await?;
        Ok(drivers
            .into_iter()
            .map(|driver| DriverListing {
                magic_link: driver
                    .magic_token
                    .as_ref()
                    .map(|token| link_url(self.base_url, token)),
                id: driver.id,
                role: driver.role,
                name: driver.name,
                notes: driver.notes,
                created_at: driver.created_at,
            })
            .collect())
    }

    /// The caller's own profile.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the principal no longer exists.
    pub async fn me(&self, caller: Option<&Claims>) -> Result<Profile, ServiceError> {
        let caller = authorize(caller, Requirement::Authenticated, Scope::Unscoped)?;
        self.principals
            .find_by_id(caller.sub)
            .await?
            .map(|p| p.profile())
            .ok_or_else(|| ServiceError::not_found("User"))
    }
}
