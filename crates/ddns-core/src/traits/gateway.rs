// # Firewall Gateway Trait
//
// Defines the interface for replacing the membership of a named firewall
// address group on a local gateway appliance.
//
// ## Implementations
//
// - UniFi: `ddns-gateway-unifi` crate

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for gateway address-group implementations
///
/// `replace_address_group` is a full replace, never an incremental
/// add/remove: after success the group holds exactly `addresses`.
#[async_trait]
pub trait FirewallGateway: Send + Sync {
    /// Replace the members of `group_id` with `addresses`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The gateway accepted the new membership
    /// - `Err(Error)`: Transport failure, or a rejection carrying the
    ///   gateway's response body
    async fn replace_address_group(
        &self,
        group_id: &str,
        addresses: &[IpAddr],
    ) -> Result<(), crate::Error>;

    /// Get the gateway name (for logging/debugging)
    fn gateway_name(&self) -> &'static str;
}
