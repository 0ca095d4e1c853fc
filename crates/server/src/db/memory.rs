//! In-memory entity store.
//!
//! Implements both store traits over a single mutex-guarded state so every
//! operation is atomic, mirroring the transactional guarantees of the
//! `PostgreSQL` store. Used by tests and by local runs without a database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use handover_core::{
    DeliveryId, DeliveryItemId, DeliveryStatus, Email, MagicToken, PrincipalId, Role,
};

use super::{DeliveryStore, PrincipalStore, RepositoryError};
use crate::models::{
    Completion, Delivery, DeliveryFilter, DeliveryItem, NewDelivery, NewPrincipal, Principal,
};

#[derive(Debug, Default)]
struct State {
    principals: Vec<Principal>,
    /// Deliveries in creation order.
    deliveries: Vec<Delivery>,
}

impl State {
    fn token_taken(&self, token: &MagicToken, except: Option<PrincipalId>) -> bool {
        self.principals
            .iter()
            .any(|p| Some(p.id) != except && p.magic_token.as_ref() == Some(token))
    }

    fn email_taken(&self, email: &Email) -> bool {
        self.principals
            .iter()
            .any(|p| p.email.as_ref().is_some_and(|e| e.matches(email.as_str())))
    }

    fn delivery_mut(&mut self, id: DeliveryId) -> Result<&mut Delivery, RepositoryError> {
        self.deliveries
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(RepositoryError::NotFound)
    }

    fn is_driver(&self, id: PrincipalId) -> bool {
        self.principals
            .iter()
            .any(|p| p.id == id && p.role == Role::Driver)
    }
}

/// Entity store held in process memory.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.principals.iter().find(|p| p.id == id).cloned())
    }

    async fn find_admin_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Principal>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .principals
            .iter()
            .find(|p| {
                p.role == Role::Admin && p.email.as_ref().is_some_and(|e| e.matches(email.as_str()))
            })
            .cloned())
    }

    async fn find_driver_by_magic_token(
        &self,
        token: &MagicToken,
    ) -> Result<Option<Principal>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .principals
            .iter()
            .find(|p| p.role == Role::Driver && p.magic_token.as_ref() == Some(token))
            .cloned())
    }

    async fn list_drivers(&self) -> Result<Vec<Principal>, RepositoryError> {
        let state = self.state.lock().await;
        let mut drivers: Vec<Principal> = state
            .principals
            .iter()
            .filter(|p| p.role == Role::Driver)
            .cloned()
            .collect();
        // Unnamed drivers last, like NULLS LAST.
        drivers.sort_by(|a, b| match (&a.name, &b.name) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Ok(drivers)
    }

    async fn create(&self, new: NewPrincipal) -> Result<Principal, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(email) = &new.email
            && state.email_taken(email)
        {
            return Err(RepositoryError::Conflict("principal already exists".to_owned()));
        }
        if let Some(token) = &new.magic_token
            && state.token_taken(token, None)
        {
            return Err(RepositoryError::Conflict("principal already exists".to_owned()));
        }

        let principal = Principal {
            id: PrincipalId::generate(),
            role: new.role,
            email: new.email,
            name: new.name,
            notes: new.notes,
            magic_token: new.magic_token,
            created_at: Utc::now(),
        };
        state.principals.push(principal.clone());
        Ok(principal)
    }

    async fn set_magic_token(
        &self,
        id: PrincipalId,
        token: Option<&MagicToken>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(token) = token
            && state.token_taken(token, Some(id))
        {
            return Err(RepositoryError::Conflict("magic token already exists".to_owned()));
        }
        let driver = state
            .principals
            .iter_mut()
            .find(|p| p.id == id && p.role == Role::Driver)
            .ok_or(RepositoryError::NotFound)?;
        driver.magic_token = token.cloned();
        Ok(())
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn create(&self, new: NewDelivery) -> Result<Delivery, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(driver) = new.assigned_driver_id
            && !state.is_driver(driver)
        {
            return Err(RepositoryError::NotFound);
        }

        let id = DeliveryId::generate();
        let delivery = Delivery {
            id,
            customer_name: new.customer_name,
            invoice_number: new.invoice_number,
            order_ref: new.order_ref,
            delivery_date_time: new.delivery_date_time,
            notes: new.notes,
            status: DeliveryStatus::Pending,
            assigned_driver_id: new.assigned_driver_id,
            invoice_file_path: new.invoice_file_path,
            photo_path: None,
            signature_path: None,
            created_at: Utc::now(),
            delivered_at: None,
            items: new
                .items
                .into_iter()
                .map(|item| DeliveryItem {
                    id: DeliveryItemId::generate(),
                    delivery_id: id,
                    name: item.name,
                    qty: item.qty,
                    delivered_qty: None,
                })
                .collect(),
        };
        state.deliveries.push(delivery.clone());
        Ok(delivery)
    }

    async fn find_by_id(&self, id: DeliveryId) -> Result<Option<Delivery>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.deliveries.iter().find(|d| d.id == id).cloned())
    }

    async fn list(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .deliveries
            .iter()
            .rev()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn assign_driver(
        &self,
        id: DeliveryId,
        driver: Option<PrincipalId>,
    ) -> Result<Delivery, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(driver) = driver
            && !state.is_driver(driver)
        {
            return Err(RepositoryError::NotFound);
        }
        let delivery = state.delivery_mut(id)?;
        if delivery.status.is_terminal() {
            return Err(RepositoryError::StaleState(delivery.status));
        }
        delivery.assigned_driver_id = driver;
        Ok(delivery.clone())
    }

    async fn complete(
        &self,
        id: DeliveryId,
        completion: &Completion,
    ) -> Result<Delivery, RepositoryError> {
        let mut state = self.state.lock().await;
        let delivery = state.delivery_mut(id)?;
        if !delivery.status.can_transition_to(DeliveryStatus::Delivered) {
            return Err(RepositoryError::StaleState(delivery.status));
        }

        for update in &completion.items {
            if let Some(item) = delivery.items.iter_mut().find(|i| i.id == update.item_id) {
                item.delivered_qty = Some(update.delivered_qty);
            }
        }
        delivery.status = DeliveryStatus::Delivered;
        delivery.delivered_at = Some(completion.delivered_at);
        delivery.signature_path = Some(completion.signature_path.clone());
        if let Some(photo) = &completion.photo_path {
            delivery.photo_path = Some(photo.clone());
        }
        Ok(delivery.clone())
    }
}
