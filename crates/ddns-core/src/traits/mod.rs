//! Core traits for the DDNS system
//!
//! This module defines the capability interfaces the reconciler drives.
//!
//! - [`AddressResolver`]: Discover the current public address
//! - [`DnsProvider`]: Read and write records held by a provider account
//! - [`FirewallGateway`]: Replace a gateway firewall address group

pub mod address_resolver;
pub mod dns_provider;
pub mod gateway;

pub use address_resolver::{AddressFamily, AddressResolver};
pub use dns_provider::{
    DnsProvider, DnsProviderFactory, DnsRecord, RecordBody, RecordFields, RecordQuery,
    RecordType, UpdateResult, Zone, ZoneQuery, ZoneStatus,
};
pub use gateway::FirewallGateway;
