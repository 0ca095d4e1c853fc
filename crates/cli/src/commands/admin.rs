//! Admin principal commands.

use handover_core::Email;
use handover_server::db::{PgDeliveryStore, PgPrincipalStore};
use handover_server::services::BootstrapService;

use super::{CommandError, base_url, connect};

/// Create the admin principal if missing.
///
/// Safe to run repeatedly; an existing admin is left untouched.
pub async fn ensure(email: Option<&str>) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    let raw = match email {
        Some(email) => email.to_owned(),
        None => std::env::var("ADMIN_EMAIL")
            .map_err(|_| CommandError::MissingEnvVar("ADMIN_EMAIL"))?,
    };
    let email = Email::parse(&raw).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;

    let pool = connect().await?;
    let principals = PgPrincipalStore::new(pool.clone());
    let deliveries = PgDeliveryStore::new(pool);
    let base_url = base_url();

    let admin = BootstrapService::new(&principals, &deliveries, &base_url)
        .ensure_admin(&email)
        .await?;

    tracing::info!("Admin ready! ID: {}, Email: {}", admin.id, email);
    Ok(())
}
