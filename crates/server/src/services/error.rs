//! Service error types.

use thiserror::Error;

use super::credentials::CredentialError;
use super::guard::Denial;
use crate::db::RepositoryError;
use crate::storage::StorageError;

/// Errors returned by the fulfillment services.
///
/// The first five variants are the caller-facing taxonomy; the rest are
/// infrastructure failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No verified caller.
    #[error("authentication required")]
    Unauthenticated,

    /// The caller may not perform the operation.
    #[error("{0}")]
    Forbidden(String),

    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The input is malformed.
    #[error("{0}")]
    Validation(String),

    /// The record is not in a status that allows the operation.
    #[error("{0}")]
    InvalidState(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Blob storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Credential could not be issued.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
}

impl From<Denial> for ServiceError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => Self::Unauthenticated,
            Denial::Forbidden | Denial::NotAssigned => Self::Forbidden(denial.to_string()),
        }
    }
}

impl ServiceError {
    pub(crate) fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
