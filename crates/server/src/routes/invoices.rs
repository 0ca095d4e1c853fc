//! Delivery creation from invoices (admin).

use axum::{
    Json, Router,
    extract::{Multipart, State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};

use handover_core::Role;

use super::form::Form;
use crate::error::AppError;
use crate::middleware::Caller;
use crate::models::Delivery;
use crate::services::{DeliveryDraft, Requirement, Scope, authorize};
use crate::state::AppState;

/// Build the invoices router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/invoices", post(create_invoice))
        .route("/api/invoices/upload", post(upload_invoice))
}

/// Create a delivery from a JSON body.
///
/// # Errors
///
/// Returns 401/403 for non-admins, 400 for a malformed body or invalid
/// fields and 404 for an unknown assigned driver.
pub async fn create_invoice(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<DeliveryDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Delivery>), AppError> {
    authorize(caller.claims(), Requirement::Role(Role::Admin), Scope::Unscoped)?;
    let Json(draft) = body?;

    let delivery = state
        .deliveries()
        .create(caller.claims(), draft, None)
        .await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

/// Create a delivery from a multipart form with an optional `invoiceFile`.
///
/// The `items` field carries the item list as a JSON string.
///
/// # Errors
///
/// As [`create_invoice`], plus 400 for a malformed form.
pub async fn upload_invoice(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Delivery>), AppError> {
    // Non-admins are rejected before the body is read.
    authorize(caller.claims(), Requirement::Role(Role::Admin), Scope::Unscoped)?;

    let mut form = Form::collect(multipart).await?;
    let draft = DeliveryDraft {
        customer_name: form.text("customerName"),
        invoice_number: form.text("invoiceNumber"),
        order_ref: form.text("orderRef"),
        delivery_date_time: form.text("deliveryDateTime"),
        notes: form.text("notes"),
        assigned_driver_id: form.text("assignedDriverId"),
        items: form.json_list("items")?,
    };
    let invoice = form.file("invoiceFile").map(|f| f.into_upload("bin"));

    let delivery = state
        .deliveries()
        .create(caller.claims(), draft, invoice)
        .await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}
