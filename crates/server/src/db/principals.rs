//! `PostgreSQL` principal store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use handover_core::{Email, MagicToken, PrincipalId, Role};

use super::{PrincipalStore, RepositoryError, conflict_on_unique};
use crate::models::{NewPrincipal, Principal};

const PRINCIPAL_COLUMNS: &str = "id, role, email, name, notes, magic_token, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    role: Role,
    email: Option<String>,
    name: Option<String>,
    notes: Option<String>,
    magic_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = RepositoryError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;
        let magic_token = row
            .magic_token
            .as_deref()
            .map(MagicToken::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid magic token in database: {e}"))
            })?;

        Ok(Self {
            id: PrincipalId::from_uuid(row.id),
            role: row.role,
            email,
            name: row.name,
            notes: row.notes,
            magic_token,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Principal store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    /// Create a new principal store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, RepositoryError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principal WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_admin_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Principal>, RepositoryError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principal
             WHERE role = 'admin' AND lower(email) = lower($1)"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_driver_by_magic_token(
        &self,
        token: &MagicToken,
    ) -> Result<Option<Principal>, RepositoryError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principal
             WHERE role = 'driver' AND magic_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_drivers(&self) -> Result<Vec<Principal>, RepositoryError> {
        let rows = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principal
             WHERE role = 'driver'
             ORDER BY name ASC NULLS LAST, created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create(&self, new: NewPrincipal) -> Result<Principal, RepositoryError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "INSERT INTO principal (id, role, email, name, notes, magic_token)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PRINCIPAL_COLUMNS}"
        ))
        .bind(PrincipalId::generate())
        .bind(new.role)
        .bind(new.email.as_ref().map(Email::as_str))
        .bind(new.name)
        .bind(new.notes)
        .bind(new.magic_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "principal"))?;

        row.try_into()
    }

    async fn set_magic_token(
        &self,
        id: PrincipalId,
        token: Option<&MagicToken>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE principal SET magic_token = $2 WHERE id = $1 AND role = 'driver'",
        )
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "magic token"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
