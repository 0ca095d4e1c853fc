//! `PostgreSQL` delivery store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use handover_core::{DeliveryId, DeliveryItemId, DeliveryStatus, PrincipalId, Quantity};

use super::{DeliveryStore, RepositoryError};
use crate::models::{Completion, Delivery, DeliveryFilter, DeliveryItem, NewDelivery};

const DELIVERY_COLUMNS: &str = "id, customer_name, invoice_number, order_ref, \
     delivery_date_time, notes, status, assigned_driver_id, invoice_file_path, \
     photo_path, signature_path, created_at, delivered_at";

const ITEM_COLUMNS: &str = "id, delivery_id, name, qty, delivered_qty";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    customer_name: String,
    invoice_number: String,
    order_ref: Option<String>,
    delivery_date_time: Option<DateTime<Utc>>,
    notes: Option<String>,
    status: DeliveryStatus,
    assigned_driver_id: Option<Uuid>,
    invoice_file_path: Option<String>,
    photo_path: Option<String>,
    signature_path: Option<String>,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl DeliveryRow {
    fn into_delivery(self, items: Vec<DeliveryItem>) -> Delivery {
        Delivery {
            id: DeliveryId::from_uuid(self.id),
            customer_name: self.customer_name,
            invoice_number: self.invoice_number,
            order_ref: self.order_ref,
            delivery_date_time: self.delivery_date_time,
            notes: self.notes,
            status: self.status,
            assigned_driver_id: self.assigned_driver_id.map(PrincipalId::from_uuid),
            invoice_file_path: self.invoice_file_path,
            photo_path: self.photo_path,
            signature_path: self.signature_path,
            created_at: self.created_at,
            delivered_at: self.delivered_at,
            items,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryItemRow {
    id: Uuid,
    delivery_id: Uuid,
    name: String,
    qty: i32,
    delivered_qty: Option<i32>,
}

impl TryFrom<DeliveryItemRow> for DeliveryItem {
    type Error = RepositoryError;

    fn try_from(row: DeliveryItemRow) -> Result<Self, Self::Error> {
        let corrupt =
            |e| RepositoryError::DataCorruption(format!("invalid quantity in database: {e}"));
        Ok(Self {
            id: DeliveryItemId::from_uuid(row.id),
            delivery_id: DeliveryId::from_uuid(row.delivery_id),
            name: row.name,
            qty: Quantity::new(row.qty).map_err(corrupt)?,
            delivered_qty: row.delivered_qty.map(Quantity::new).transpose().map_err(corrupt)?,
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Delivery store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgDeliveryStore {
    pool: PgPool,
}

impl PgDeliveryStore {
    /// Create a new delivery store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load items for the given deliveries, grouped by delivery in position order.
    async fn items_for(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<DeliveryItem>>, RepositoryError> {
        let rows = sqlx::query_as::<_, DeliveryItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM delivery_item
             WHERE delivery_id = ANY($1)
             ORDER BY delivery_id, position"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<DeliveryItem>> = HashMap::new();
        for row in rows {
            let key = row.delivery_id;
            grouped.entry(key).or_default().push(row.try_into()?);
        }
        Ok(grouped)
    }

    async fn load(&self, rows: Vec<DeliveryRow>) -> Result<Vec<Delivery>, RepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let own = items.remove(&row.id).unwrap_or_default();
                row.into_delivery(own)
            })
            .collect())
    }

    /// Current status of a delivery, locking its row for the transaction.
    async fn lock_status(
        tx: &mut Transaction<'_, Postgres>,
        id: DeliveryId,
    ) -> Result<DeliveryStatus, RepositoryError> {
        sqlx::query_scalar::<_, DeliveryStatus>(
            "SELECT status FROM delivery WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn fetch(&self, id: DeliveryId) -> Result<Delivery, RepositoryError> {
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl DeliveryStore for PgDeliveryStore {
    async fn create(&self, new: NewDelivery) -> Result<Delivery, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "INSERT INTO delivery (id, customer_name, invoice_number, order_ref,
                 delivery_date_time, notes, assigned_driver_id, invoice_file_path)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {DELIVERY_COLUMNS}"
        ))
        .bind(DeliveryId::generate())
        .bind(&new.customer_name)
        .bind(&new.invoice_number)
        .bind(&new.order_ref)
        .bind(new.delivery_date_time)
        .bind(&new.notes)
        .bind(new.assigned_driver_id)
        .bind(&new.invoice_file_path)
        .fetch_one(&mut *tx)
        .await
        .map_err(missing_driver)?;

        let mut items = Vec::with_capacity(new.items.len());
        for (position, item) in (0_i32..).zip(&new.items) {
            let item_row = sqlx::query_as::<_, DeliveryItemRow>(&format!(
                "INSERT INTO delivery_item (id, delivery_id, position, name, qty)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(DeliveryItemId::generate())
            .bind(row.id)
            .bind(position)
            .bind(&item.name)
            .bind(item.qty)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item_row.try_into()?);
        }

        tx.commit().await?;
        Ok(row.into_delivery(items))
    }

    async fn find_by_id(&self, id: DeliveryId) -> Result<Option<Delivery>, RepositoryError> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM delivery WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>, RepositoryError> {
        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM delivery
             WHERE ($1::delivery_status IS NULL OR status = $1)
               AND ($2::uuid IS NULL OR assigned_driver_id = $2)
             ORDER BY created_at DESC"
        ))
        .bind(filter.status)
        .bind(filter.driver_id)
        .fetch_all(&self.pool)
        .await?;

        self.load(rows).await
    }

    async fn assign_driver(
        &self,
        id: DeliveryId,
        driver: Option<PrincipalId>,
    ) -> Result<Delivery, RepositoryError> {
        let result = sqlx::query(
            "UPDATE delivery SET assigned_driver_id = $2
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(driver)
        .execute(&self.pool)
        .await
        .map_err(missing_driver)?;

        if result.rows_affected() == 0 {
            let current = self.fetch(id).await?;
            return Err(RepositoryError::StaleState(current.status));
        }
        self.fetch(id).await
    }

    async fn complete(
        &self,
        id: DeliveryId,
        completion: &Completion,
    ) -> Result<Delivery, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status = Self::lock_status(&mut tx, id).await?;
        if !status.can_transition_to(DeliveryStatus::Delivered) {
            return Err(RepositoryError::StaleState(status));
        }

        for update in &completion.items {
            sqlx::query(
                "UPDATE delivery_item SET delivered_qty = $3
                 WHERE id = $1 AND delivery_id = $2",
            )
            .bind(update.item_id)
            .bind(id)
            .bind(update.delivered_qty)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            "UPDATE delivery
             SET status = 'delivered',
                 delivered_at = $2,
                 signature_path = $3,
                 photo_path = COALESCE($4, photo_path)
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(completion.delivered_at)
        .bind(&completion.signature_path)
        .bind(&completion.photo_path)
        .execute(&mut *tx)
        .await?;

        // Dropping the transaction rolls back the item updates.
        if result.rows_affected() == 0 {
            return Err(RepositoryError::StaleState(DeliveryStatus::Delivered));
        }

        tx.commit().await?;
        self.fetch(id).await
    }
}

/// Map a foreign key violation on `assigned_driver_id` to `NotFound`.
fn missing_driver(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(e)
}
