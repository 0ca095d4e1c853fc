//! Driver management commands.
//!
//! Rotating and revoking magic links is only exposed here, not over HTTP.

use handover_core::PrincipalId;
use handover_server::db::{PgPrincipalStore, PrincipalStore, RepositoryError};
use handover_server::services::{DirectoryService, MagicLinkRegistry};

use super::{CommandError, base_url, connect};

/// Create a driver and print its magic link.
pub async fn create(name: Option<String>, notes: Option<String>) -> Result<(), CommandError> {
    let principals = PgPrincipalStore::new(connect().await?);
    let base_url = base_url();

    let driver = DirectoryService::new(&principals, &base_url)
        .provision_driver(name, notes)
        .await?;

    tracing::info!("Driver created! ID: {}", driver.id);
    tracing::info!("Share this magic link with the driver:");
    tracing::info!("  {}", driver.magic_link);
    Ok(())
}

/// Print all drivers with their current links.
pub async fn list() -> Result<(), CommandError> {
    let principals = PgPrincipalStore::new(connect().await?);
    let base_url = base_url();
    let registry = MagicLinkRegistry::new(&principals, &base_url);

    let drivers = principals.list_drivers().await?;
    tracing::info!("{} driver(s)", drivers.len());
    for driver in drivers {
        let link = driver
            .magic_token
            .map_or_else(|| "(no link)".to_owned(), |token| registry.link(token).url);
        tracing::info!(
            "  {}  {}  {}",
            driver.id,
            driver.name.as_deref().unwrap_or("(unnamed)"),
            link
        );
    }
    Ok(())
}

/// Replace a driver's magic link.
pub async fn rotate_link(id: &str) -> Result<(), CommandError> {
    let id = parse_id(id)?;
    let principals = PgPrincipalStore::new(connect().await?);
    let base_url = base_url();

    let link = MagicLinkRegistry::new(&principals, &base_url)
        .rotate(id)
        .await
        .map_err(|e| not_a_driver(e, id))?;

    tracing::info!("Magic link rotated. The previous link no longer works.");
    tracing::info!("  {}", link.url);
    Ok(())
}

/// Remove a driver's magic link.
pub async fn revoke_link(id: &str) -> Result<(), CommandError> {
    let id = parse_id(id)?;
    let principals = PgPrincipalStore::new(connect().await?);
    let base_url = base_url();

    MagicLinkRegistry::new(&principals, &base_url)
        .revoke(id)
        .await
        .map_err(|e| not_a_driver(e, id))?;

    tracing::info!("Magic link revoked for driver {id}");
    Ok(())
}

fn parse_id(raw: &str) -> Result<PrincipalId, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::InvalidArgument(format!("not a driver ID: {raw}")))
}

fn not_a_driver(err: RepositoryError, id: PrincipalId) -> CommandError {
    match err {
        RepositoryError::NotFound => {
            CommandError::InvalidArgument(format!("no driver with ID {id}"))
        }
        other => other.into(),
    }
}
