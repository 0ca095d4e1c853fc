//! Demo data command.

use handover_server::db::{PgDeliveryStore, PgPrincipalStore};
use handover_server::services::BootstrapService;

use super::{CommandError, base_url, connect};

/// Seed a demo driver and delivery unless drivers already exist.
pub async fn demo() -> Result<(), CommandError> {
    let pool = connect().await?;
    let principals = PgPrincipalStore::new(pool.clone());
    let deliveries = PgDeliveryStore::new(pool);
    let base_url = base_url();

    match BootstrapService::new(&principals, &deliveries, &base_url)
        .seed_demo()
        .await?
    {
        Some(seed) => {
            tracing::info!("Demo delivery created: {}", seed.delivery_id);
            tracing::info!("Demo driver magic link:");
            tracing::info!("  {}", seed.magic_link);
        }
        None => tracing::info!("Drivers already exist, skipping demo seed"),
    }
    Ok(())
}
