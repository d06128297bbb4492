//! Zone lookup
//!
//! Resolves a configured zone name to the provider's zone handle. The lookup
//! asks for at most one active zone with the exact name, so the first result
//! is authoritative.

use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{DnsProvider, Zone, ZoneQuery};

/// Locate `zone_name` through `provider`
///
/// # Returns
///
/// - `Ok(Zone)`: The provider's handle for the zone
/// - `Err(Error::NotFound)`: No active zone with that name
/// - `Err(Error)`: Transport or authentication failure
pub async fn locate_zone(provider: &dyn DnsProvider, zone_name: &str) -> Result<Zone> {
    let zones = provider
        .list_zones(&ZoneQuery::exact_active(zone_name))
        .await?;

    let zone = zones
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(format!("zone {}", zone_name)))?;

    debug!("Located zone {} ({})", zone.name, zone.id);
    Ok(zone)
}
