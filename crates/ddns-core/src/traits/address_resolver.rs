// # Address Resolver Trait
//
// Defines the interface for discovering the caller's current public address.
//
// ## Implementations
//
// - HTTP (ipify): `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{AddressFamily, AddressResolver};
//
// let ipv4 = resolver.resolve(AddressFamily::V4).await?;
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

use super::dns_provider::RecordType;

/// Address family (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// DNS record type that carries this family
    pub fn record_type(self) -> RecordType {
        match self {
            AddressFamily::V4 => RecordType::A,
            AddressFamily::V6 => RecordType::Aaaa,
        }
    }

    /// Whether `address` belongs to this family
    pub fn matches(self, address: IpAddr) -> bool {
        match self {
            AddressFamily::V4 => address.is_ipv4(),
            AddressFamily::V6 => address.is_ipv6(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("ipv4"),
            AddressFamily::V6 => f.write_str("ipv6"),
        }
    }
}

/// Trait for public address discovery
///
/// Implementations perform one lookup per call and must validate that the
/// returned literal belongs to the requested family.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve the current egress address for `family`
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: A validated address of the requested family
    /// - `Err(Error)`: If the lookup failed or returned an invalid literal
    async fn resolve(&self, family: AddressFamily) -> Result<IpAddr, crate::Error>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}
