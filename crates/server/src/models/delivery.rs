//! Delivery domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use handover_core::{DeliveryId, DeliveryItemId, DeliveryStatus, PrincipalId, Quantity};

/// A delivery record with its items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: DeliveryId,
    pub customer_name: String,
    pub invoice_number: String,
    pub order_ref: Option<String>,
    pub delivery_date_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: DeliveryStatus,
    pub assigned_driver_id: Option<PrincipalId>,
    pub invoice_file_path: Option<String>,
    pub photo_path: Option<String>,
    pub signature_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// Items in creation order.
    pub items: Vec<DeliveryItem>,
}

impl Delivery {
    /// Returns the item with `id`, if it belongs to this delivery.
    #[must_use]
    pub fn item(&self, id: DeliveryItemId) -> Option<&DeliveryItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// A line item of a delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryItem {
    pub id: DeliveryItemId,
    pub delivery_id: DeliveryId,
    pub name: String,
    /// Ordered quantity.
    pub qty: Quantity,
    /// Confirmed quantity; unset until the delivery is confirmed.
    pub delivered_qty: Option<Quantity>,
}

/// Validated input for creating a delivery.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub customer_name: String,
    pub invoice_number: String,
    pub order_ref: Option<String>,
    pub delivery_date_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub assigned_driver_id: Option<PrincipalId>,
    pub invoice_file_path: Option<String>,
    pub items: Vec<NewDeliveryItem>,
}

/// Validated input for one item of a new delivery.
#[derive(Debug, Clone)]
pub struct NewDeliveryItem {
    pub name: String,
    pub qty: Quantity,
}

/// Filter for listing deliveries. Set fields combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub driver_id: Option<PrincipalId>,
}

impl DeliveryFilter {
    /// Returns true if `delivery` passes the filter.
    #[must_use]
    pub fn matches(&self, delivery: &Delivery) -> bool {
        self.status.is_none_or(|s| delivery.status == s)
            && self
                .driver_id
                .is_none_or(|d| delivery.assigned_driver_id == Some(d))
    }
}

/// A confirmed quantity for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDelivered {
    pub item_id: DeliveryItemId,
    pub delivered_qty: Quantity,
}

/// Everything the store applies when a delivery transitions to delivered.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Item updates, already restricted to items of the delivery.
    pub items: Vec<ItemDelivered>,
    pub signature_path: String,
    pub photo_path: Option<String>,
    pub delivered_at: DateTime<Utc>,
}
