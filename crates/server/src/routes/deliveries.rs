//! Delivery route handlers.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::Deserialize;

use handover_core::{DeliveryId, DeliveryStatus, PrincipalId, Role};

use super::form::Form;
use crate::error::AppError;
use crate::middleware::Caller;
use crate::models::{Delivery, DeliveryFilter};
use crate::services::{
    ConfirmDelivery, DeliveryDetail, ItemReports, Requirement, Scope, authorize,
};
use crate::state::AppState;

/// Build the deliveries router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/deliveries", get(list_deliveries))
        .route("/api/deliveries/{id}", get(get_delivery))
        .route("/api/deliveries/{id}/assign", post(assign_delivery))
        .route("/api/deliveries/{id}/confirm", post(confirm_delivery))
        .route("/my-deliveries", get(my_deliveries))
}

/// Query parameters for listing deliveries.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub driver_id: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<DeliveryFilter, AppError> {
        let status = present(self.status)
            .map(|raw| {
                raw.parse::<DeliveryStatus>()
                    .map_err(|_| AppError::BadRequest(format!("Invalid status '{raw}'")))
            })
            .transpose()?;
        let driver_id = present(self.driver_id)
            .map(|raw| parse_driver_id(&raw))
            .transpose()?;
        Ok(DeliveryFilter { status, driver_id })
    }
}

/// Request for assigning a driver. `null` or a missing field unassigns.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[serde(default)]
    pub driver_id: Option<String>,
}

/// List deliveries visible to the caller.
///
/// # Errors
///
/// Returns 401 without a caller and 400 for an unparseable filter.
pub async fn list_deliveries(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Delivery>>, AppError> {
    let filter = query.into_filter()?;
    Ok(Json(state.deliveries().list(caller.claims(), filter).await?))
}

/// Deliveries assigned to the calling driver.
///
/// # Errors
///
/// Returns 401/403 for callers without the driver role.
pub async fn my_deliveries(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<Delivery>>, AppError> {
    Ok(Json(state.deliveries().list_assigned(caller.claims()).await?))
}

/// Delivery detail with the assigned driver's profile.
///
/// # Errors
///
/// Returns 401 without a caller, 404 for unknown or malformed IDs and 403
/// for another driver's delivery.
pub async fn get_delivery(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<DeliveryDetail>, AppError> {
    authorize(caller.claims(), Requirement::Authenticated, Scope::Unscoped)?;
    let id = parse_delivery_id(&id)?;
    Ok(Json(state.deliveries().get(caller.claims(), id).await?))
}

/// Set or clear the assigned driver.
///
/// # Errors
///
/// Returns 401/403 for non-admins, 404 for an unknown delivery or driver,
/// 409 once delivered and 400 for a malformed body.
pub async fn assign_delivery(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Option<Json<AssignRequest>>, JsonRejection>,
) -> Result<Json<Delivery>, AppError> {
    authorize(caller.claims(), Requirement::Role(Role::Admin), Scope::Unscoped)?;
    let id = parse_delivery_id(&id)?;
    let Json(body) = body?.unwrap_or_default();
    let driver = present(body.driver_id)
        .map(|raw| parse_driver_id(&raw))
        .transpose()?;
    Ok(Json(
        state
            .deliveries()
            .assign(caller.claims(), id, driver)
            .await?,
    ))
}

/// Confirm a delivery from a multipart form.
///
/// Fields: `items` (JSON array of `{id, deliveredQty}`), `signatureDataUrl`
/// and an optional `photo` file.
///
/// # Errors
///
/// Returns 401 without a driver caller, then 404, 403, 409 or 400 as the
/// service decides. The `items` text is decoded by the service after the
/// state checks.
pub async fn confirm_delivery(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Delivery>, AppError> {
    authorize(caller.claims(), Requirement::Role(Role::Driver), Scope::Unscoped)?;
    let id = parse_delivery_id(&id)?;
    let mut form = Form::collect(multipart).await?;
    let payload = ConfirmDelivery {
        items: form.text("items").map(ItemReports::Json).unwrap_or_default(),
        signature_data_url: form.text("signatureDataUrl"),
        photo: form.file("photo").map(|f| f.into_upload("jpg")),
    };
    Ok(Json(
        state
            .deliveries()
            .confirm(caller.claims(), id, payload)
            .await?,
    ))
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_delivery_id(raw: &str) -> Result<DeliveryId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound("Delivery not found".to_string()))
}

fn parse_driver_id(raw: &str) -> Result<PrincipalId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid driver id '{raw}'")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_filter() {
        let driver = PrincipalId::generate();
        let query = ListQuery {
            status: Some("delivered".to_string()),
            driver_id: Some(driver.to_string()),
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.status, Some(DeliveryStatus::Delivered));
        assert_eq!(filter.driver_id, Some(driver));

        let empty = ListQuery {
            status: Some(String::new()),
            driver_id: Some("  ".to_string()),
        };
        assert_eq!(empty.into_filter().unwrap(), DeliveryFilter::default());
    }

    #[test]
    fn test_list_query_rejects_garbage() {
        let bad_status = ListQuery {
            status: Some("lost".to_string()),
            driver_id: None,
        };
        assert!(matches!(bad_status.into_filter(), Err(AppError::BadRequest(_))));

        let bad_driver = ListQuery {
            status: None,
            driver_id: Some("nope".to_string()),
        };
        assert!(matches!(bad_driver.into_filter(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_malformed_delivery_id_is_not_found() {
        assert!(matches!(
            parse_delivery_id("not-a-uuid"),
            Err(AppError::NotFound(_))
        ));
    }
}
