//! Startup bootstrap: the configured admin principal and the demo seed.
//!
//! Both procedures are idempotent and safe to run on every start.
//! [`BootstrapService::ensure_admin`] also tolerates several processes
//! starting at once; [`BootstrapService::seed_demo`] checks for drivers
//! before creating one, so concurrent first starts may each seed.

use tracing::instrument;

use handover_core::{DeliveryId, Email, PrincipalId, Quantity};

use super::directory::DirectoryService;
use super::error::ServiceError;
use crate::db::{DeliveryStore, PrincipalStore, RepositoryError};
use crate::models::{NewDelivery, NewDeliveryItem, NewPrincipal, Principal};

/// Display name given to the bootstrapped admin.
pub const ADMIN_NAME: &str = "Admin User";

/// What the demo seed created.
#[derive(Debug, Clone)]
pub struct DemoSeed {
    pub driver_id: PrincipalId,
    pub delivery_id: DeliveryId,
    pub magic_link: String,
}

/// Bootstrap service.
pub struct BootstrapService<'a> {
    principals: &'a dyn PrincipalStore,
    deliveries: &'a dyn DeliveryStore,
    base_url: &'a str,
}

impl<'a> BootstrapService<'a> {
    /// Create a new bootstrap service.
    #[must_use]
    pub const fn new(
        principals: &'a dyn PrincipalStore,
        deliveries: &'a dyn DeliveryStore,
        base_url: &'a str,
    ) -> Self {
        Self {
            principals,
            deliveries,
            base_url,
        }
    }

    /// Make sure exactly one admin principal exists for `email`.
    ///
    /// A concurrent creator losing the unique-email race re-reads the winner.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the admin can be neither found nor created.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn ensure_admin(&self, email: &Email) -> Result<Principal, ServiceError> {
        if let Some(admin) = self.principals.find_admin_by_email(email).await? {
            return Ok(admin);
        }

        let new = NewPrincipal::admin(email.clone(), Some(ADMIN_NAME.to_owned()));
        match self.principals.create(new).await {
            Ok(admin) => {
                tracing::info!(admin_id = %admin.id, "Admin principal created");
                Ok(admin)
            }
            Err(RepositoryError::Conflict(_)) => self
                .principals
                .find_admin_by_email(email)
                .await?
                .ok_or_else(|| {
                    ServiceError::Repository(RepositoryError::Conflict(
                        "email is taken by a non-admin principal".to_owned(),
                    ))
                }),
            Err(e) => Err(e.into()),
        }
    }

    /// Seed a demo driver with one assigned delivery, unless drivers exist.
    ///
    /// Returns `None` when there was nothing to seed.
    ///
    /// # Errors
    ///
    /// Returns a repository error if seeding fails.
    #[instrument(skip(self))]
    pub async fn seed_demo(&self) -> Result<Option<DemoSeed>, ServiceError> {
        if !self.principals.list_drivers().await?.is_empty() {
            tracing::debug!("Drivers exist, skipping demo seed");
            return Ok(None);
        }

        let driver = DirectoryService::new(self.principals, self.base_url)
            .provision_driver(
                Some("Demo Driver".to_owned()),
                Some("Plates ABC123".to_owned()),
            )
            .await?;

        let delivery = self
            .deliveries
            .create(NewDelivery {
                customer_name: "Demo Customer".to_owned(),
                invoice_number: "INV-DEMO-001".to_owned(),
                order_ref: Some("ORDER-DEMO".to_owned()),
                delivery_date_time: None,
                notes: Some("Demo seeded delivery for quick testing".to_owned()),
                assigned_driver_id: Some(driver.id),
                invoice_file_path: None,
                items: vec![
                    demo_item("Sample Boxes", 5)?,
                    demo_item("Promo Flyers", 100)?,
                ],
            })
            .await?;

        tracing::info!(
            driver_id = %driver.id,
            delivery_id = %delivery.id,
            magic_link = %driver.magic_link,
            "Seeded demo driver and delivery"
        );
        Ok(Some(DemoSeed {
            driver_id: driver.id,
            delivery_id: delivery.id,
            magic_link: driver.magic_link,
        }))
    }
}

fn demo_item(name: &str, qty: i32) -> Result<NewDeliveryItem, ServiceError> {
    Ok(NewDeliveryItem {
        name: name.to_owned(),
        qty: Quantity::new(qty).map_err(|e| ServiceError::validation(e.to_string()))?,
    })
}
