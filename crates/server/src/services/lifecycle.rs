//! Delivery lifecycle.
//!
//! A delivery starts `pending`, may be (re)assigned while pending, and is
//! confirmed exactly once by its driver, which moves it to `delivered`.
//!
//! Confirmation checks, in order: the delivery exists, the caller may act on
//! it, it is still pending, the payload is well formed. Evidence blobs are
//! written before the store transaction; the item quantities and the status
//! flip then commit together, conditional on the delivery still being
//! pending. A failed confirmation leaves the delivery untouched and can be
//! retried.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use handover_core::{DeliveryId, DeliveryItemId, PrincipalId, Quantity, Role};

use super::credentials::Claims;
use super::error::ServiceError;
use super::guard::{Requirement, Scope, authorize, scope_list};
use crate::db::{DeliveryStore, PrincipalStore, RepositoryError};
use crate::models::{
    Completion, Delivery, DeliveryFilter, ItemDelivered, NewDelivery, NewDeliveryItem, Profile,
};
use crate::storage::{self, BlobStore};

// =============================================================================
// Inputs and Views
// =============================================================================

/// Unvalidated delivery fields as submitted by an operator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDraft {
    pub customer_name: Option<String>,
    pub invoice_number: Option<String>,
    pub order_ref: Option<String>,
    /// RFC 3339, or a local `YYYY-MM-DDTHH:MM[:SS]` taken as UTC.
    pub delivery_date_time: Option<String>,
    pub notes: Option<String>,
    pub assigned_driver_id: Option<String>,
    #[serde(default)]
    pub items: Vec<DraftItem>,
}

/// Unvalidated delivery item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftItem {
    #[serde(default)]
    pub name: Option<String>,
    /// Number or numeric string; missing means 0.
    #[serde(default)]
    pub qty: Value,
}

/// A driver's report for one item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    #[serde(default)]
    pub id: Option<String>,
    /// Number or numeric string; missing means 0.
    #[serde(default)]
    pub delivered_qty: Value,
}

/// Item reports as submitted.
///
/// Raw JSON text is decoded only once the delivery is known to accept a
/// confirmation, so a malformed list never masks a denial.
#[derive(Debug, Clone)]
pub enum ItemReports {
    List(Vec<ItemReport>),
    Json(String),
}

impl Default for ItemReports {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl From<Vec<ItemReport>> for ItemReports {
    fn from(reports: Vec<ItemReport>) -> Self {
        Self::List(reports)
    }
}

impl ItemReports {
    /// Decode into reports; blank text is an empty list.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` if the text is not a JSON array of
    /// item reports.
    pub fn decode(self) -> Result<Vec<ItemReport>, ServiceError> {
        match self {
            Self::List(reports) => Ok(reports),
            Self::Json(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Self::Json(raw) => serde_json::from_str(&raw)
                .map_err(|_| ServiceError::validation("items must be a JSON array")),
        }
    }
}

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    /// Lowercase extension without the dot.
    pub extension: String,
}

/// A driver's confirmation payload.
#[derive(Debug, Clone, Default)]
pub struct ConfirmDelivery {
    pub items: ItemReports,
    /// `data:image/png;base64,...`
    pub signature_data_url: Option<String>,
    pub photo: Option<Upload>,
}

/// A delivery together with its assigned driver's profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetail {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub assigned_driver: Option<Profile>,
}

// =============================================================================
// Service
// =============================================================================

/// Delivery lifecycle service.
pub struct DeliveryService<'a> {
    principals: &'a dyn PrincipalStore,
    deliveries: &'a dyn DeliveryStore,
    blobs: &'a dyn BlobStore,
}

impl<'a> DeliveryService<'a> {
    /// Create a new delivery service.
    #[must_use]
    pub const fn new(
        principals: &'a dyn PrincipalStore,
        deliveries: &'a dyn DeliveryStore,
        blobs: &'a dyn BlobStore,
    ) -> Self {
        Self {
            principals,
            deliveries,
            blobs,
        }
    }

    /// Create a pending delivery with its items (admin).
    ///
    /// An attached invoice document is stored after validation and before the
    /// delivery is created.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for missing required fields, bad
    /// quantities or an unparseable date, and `ServiceError::NotFound` if the
    /// assigned driver does not exist. No delivery is stored on error.
    #[instrument(skip_all)]
    pub async fn create(
        &self,
        caller: Option<&Claims>,
        draft: DeliveryDraft,
        invoice: Option<Upload>,
    ) -> Result<Delivery, ServiceError> {
        authorize(caller, Requirement::Role(Role::Admin), Scope::Unscoped)?;

        let mut new = validate_draft(draft)?;
        if let Some(driver) = new.assigned_driver_id {
            self.require_driver(driver).await?;
        }
        if let Some(invoice) = &invoice {
            new.invoice_file_path = Some(
                self.blobs
                    .write(storage::INVOICES, &invoice.extension, &invoice.bytes)
                    .await?,
            );
        }

        let delivery = self.deliveries.create(new).await.map_err(|e| match e {
            RepositoryError::NotFound => ServiceError::not_found("Driver"),
            other => other.into(),
        })?;

        tracing::info!(
            delivery_id = %delivery.id,
            items = delivery.items.len(),
            "Delivery created"
        );
        Ok(delivery)
    }

    /// Fetch a delivery the caller may see, with the assigned driver's profile.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` or the guard's denial.
    pub async fn get(
        &self,
        caller: Option<&Claims>,
        id: DeliveryId,
    ) -> Result<DeliveryDetail, ServiceError> {
        authorize(caller, Requirement::Authenticated, Scope::Unscoped)?;
        let delivery = self.find(id).await?;
        authorize(
            caller,
            Requirement::Authenticated,
            Scope::Delivery(delivery.assigned_driver_id),
        )?;

        let assigned_driver = match delivery.assigned_driver_id {
            Some(driver) => self
                .principals
                .find_by_id(driver)
                .await?
                .map(|p| p.profile()),
            None => None,
        };
        Ok(DeliveryDetail {
            delivery,
            assigned_driver,
        })
    }

    /// List deliveries visible to the caller, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Unauthenticated` without a caller.
    pub async fn list(
        &self,
        caller: Option<&Claims>,
        requested: DeliveryFilter,
    ) -> Result<Vec<Delivery>, ServiceError> {
        let caller = authorize(caller, Requirement::Authenticated, Scope::Unscoped)?;
        match scope_list(caller, requested) {
            Some(filter) => Ok(self.deliveries.list(&filter).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Deliveries assigned to the calling driver, newest first.
    ///
    /// # Errors
    ///
    /// Returns the guard's denial for callers without the driver role.
    pub async fn list_assigned(
        &self,
        caller: Option<&Claims>,
    ) -> Result<Vec<Delivery>, ServiceError> {
        let caller = authorize(caller, Requirement::Role(Role::Driver), Scope::Unscoped)?;
        let filter = DeliveryFilter {
            status: None,
            driver_id: Some(caller.sub),
        };
        Ok(self.deliveries.list(&filter).await?)
    }

    /// Set or clear the assigned driver of a pending delivery (admin).
    ///
    /// Assigning the current driver again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown delivery or driver and
    /// `ServiceError::InvalidState` once the delivery is delivered.
    #[instrument(skip(self, caller), fields(delivery_id = %id))]
    pub async fn assign(
        &self,
        caller: Option<&Claims>,
        id: DeliveryId,
        driver: Option<PrincipalId>,
    ) -> Result<Delivery, ServiceError> {
        authorize(caller, Requirement::Role(Role::Admin), Scope::Unscoped)?;
        if let Some(driver) = driver {
            self.require_driver(driver).await?;
        }

        let delivery = self
            .deliveries
            .assign_driver(id, driver)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ServiceError::not_found("Delivery"),
                RepositoryError::StaleState(_) => already_delivered(),
                other => other.into(),
            })?;

        tracing::info!(driver_id = ?driver, "Delivery assigned");
        Ok(delivery)
    }

    /// Confirm a delivery with item quantities and evidence (driver).
    ///
    /// Resubmitting quantities is not cumulative: the last confirmation that
    /// wins the transition decides the stored values. Item reports without an
    /// ID or naming an item of another delivery are skipped.
    ///
    /// # Errors
    ///
    /// Returns, in order of precedence, `ServiceError::NotFound`,
    /// `ServiceError::Forbidden`, `ServiceError::InvalidState` and
    /// `ServiceError::Validation`.
    #[instrument(skip(self, caller, payload), fields(delivery_id = %id))]
    pub async fn confirm(
        &self,
        caller: Option<&Claims>,
        id: DeliveryId,
        payload: ConfirmDelivery,
    ) -> Result<Delivery, ServiceError> {
        authorize(caller, Requirement::Role(Role::Driver), Scope::Unscoped)?;
        let delivery = self.find(id).await?;
        authorize(
            caller,
            Requirement::Role(Role::Driver),
            Scope::Delivery(delivery.assigned_driver_id),
        )?;
        if delivery.status.is_terminal() {
            return Err(already_delivered());
        }

        let reports = payload.items.decode()?;
        let items = collect_item_updates(&delivery, &reports)?;
        let signature_url = payload
            .signature_data_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ServiceError::validation("Signature is required"))?;
        let signature = decode_data_url(signature_url)?;

        let signature_path = self
            .blobs
            .write(storage::SIGNATURES, &signature.extension, &signature.bytes)
            .await?;
        let photo_path = match &payload.photo {
            Some(photo) => Some(
                self.blobs
                    .write(storage::PHOTOS, &photo.extension, &photo.bytes)
                    .await?,
            ),
            None => None,
        };

        let completion = Completion {
            items,
            signature_path,
            photo_path,
            delivered_at: Utc::now(),
        };
        let delivered = self
            .deliveries
            .complete(id, &completion)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ServiceError::not_found("Delivery"),
                RepositoryError::StaleState(_) => already_delivered(),
                other => other.into(),
            })?;

        tracing::info!(items = completion.items.len(), "Delivery confirmed");
        Ok(delivered)
    }

    async fn find(&self, id: DeliveryId) -> Result<Delivery, ServiceError> {
        self.deliveries
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery"))
    }

    async fn require_driver(&self, id: PrincipalId) -> Result<(), ServiceError> {
        match self.principals.find_by_id(id).await? {
            Some(p) if p.is_driver() => Ok(()),
            _ => Err(ServiceError::not_found("Driver")),
        }
    }
}

fn already_delivered() -> ServiceError {
    ServiceError::InvalidState("Delivery already delivered".to_owned())
}

// =============================================================================
// Validation
// =============================================================================

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn validate_draft(draft: DeliveryDraft) -> Result<NewDelivery, ServiceError> {
    let customer_name = non_blank(draft.customer_name)
        .ok_or_else(|| ServiceError::validation("customerName is required"))?;
    let invoice_number = non_blank(draft.invoice_number)
        .ok_or_else(|| ServiceError::validation("invoiceNumber is required"))?;

    let delivery_date_time = non_blank(draft.delivery_date_time)
        .map(|raw| parse_delivery_date_time(&raw))
        .transpose()?;

    let assigned_driver_id = non_blank(draft.assigned_driver_id)
        .map(|raw| {
            raw.parse::<PrincipalId>()
                .map_err(|_| ServiceError::validation("assignedDriverId is not a valid id"))
        })
        .transpose()?;

    let items = draft
        .items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let qty = Quantity::from_json(&item.qty).map_err(|e| {
                ServiceError::validation(format!("items[{index}].qty: {e}"))
            })?;
            Ok(NewDeliveryItem {
                name: item.name.map(|n| n.trim().to_owned()).unwrap_or_default(),
                qty,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(NewDelivery {
        customer_name,
        invoice_number,
        order_ref: non_blank(draft.order_ref),
        delivery_date_time,
        notes: non_blank(draft.notes),
        assigned_driver_id,
        invoice_file_path: None,
        items,
    })
}

/// Parse an RFC 3339 timestamp, or a zone-less local time taken as UTC.
fn parse_delivery_date_time(raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    const LOCAL_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    Err(ServiceError::validation(format!(
        "deliveryDateTime '{raw}' is not a valid date and time"
    )))
}

/// Keep reports naming items of `delivery`; later reports for the same item win.
fn collect_item_updates(
    delivery: &Delivery,
    reports: &[ItemReport],
) -> Result<Vec<ItemDelivered>, ServiceError> {
    let mut updates: Vec<ItemDelivered> = Vec::new();
    for report in reports {
        let Some(item_id) = report
            .id
            .as_deref()
            .and_then(|raw| raw.trim().parse::<DeliveryItemId>().ok())
            .filter(|id| delivery.item(*id).is_some())
        else {
            tracing::debug!(item_id = ?report.id, "Skipping report for unknown item");
            continue;
        };

        let delivered_qty = Quantity::from_json(&report.delivered_qty)
            .map_err(|e| ServiceError::validation(format!("deliveredQty for item {item_id}: {e}")))?;

        match updates.iter_mut().find(|u| u.item_id == item_id) {
            Some(existing) => existing.delivered_qty = delivered_qty,
            None => updates.push(ItemDelivered {
                item_id,
                delivered_qty,
            }),
        }
    }
    Ok(updates)
}

/// Decode a base64 `data:` URL into an upload.
fn decode_data_url(url: &str) -> Result<Upload, ServiceError> {
    let invalid = || ServiceError::validation("Signature must be a base64 image data URL");

    let rest = url.trim().strip_prefix("data:").ok_or_else(invalid)?;
    let (header, data) = rest.split_once(',').ok_or_else(invalid)?;
    let mime = header.strip_suffix(";base64").ok_or_else(invalid)?;
    let extension = match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => return Err(invalid()),
    };

    let bytes = STANDARD.decode(data.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }
    Ok(Upload {
        bytes,
        extension: extension.to_owned(),
    })
}
