// # DNS Provider Trait
//
// Defines the capability interface the reconciler uses to read and write
// records held by a DNS provider account.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{DnsProvider, RecordQuery, RecordType, ZoneQuery};
//
// let zones = provider.list_zones(&ZoneQuery::exact_active("example.com")).await?;
// let records = provider
//     .list_records(&zones[0].id, &RecordQuery::exact("home.example.com", RecordType::A))
//     .await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use super::address_resolver::AddressFamily;

/// A provider-side zone handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider-assigned identifier
    pub id: String,
    /// Human-readable zone name
    pub name: String,
}

/// Zone status filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    Active,
}

impl ZoneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneStatus::Active => "active",
        }
    }
}

/// Zone lookup parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneQuery {
    /// Exact zone name
    pub name: String,
    pub status: ZoneStatus,
    pub page: u32,
    pub per_page: u32,
}

impl ZoneQuery {
    /// Single-page, single-result, active-only, exact-name lookup
    pub fn exact_active(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ZoneStatus::Active,
            page: 1,
            per_page: 1,
        }
    }
}

/// DNS record type managed by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    #[serde(rename = "A")]
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Address family this record type carries
    pub fn family(self) -> AddressFamily {
        match self {
            RecordType::A => AddressFamily::V4,
            RecordType::Aaaa => AddressFamily::V6,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record lookup parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Exact record name
    pub name: String,
    pub record_type: RecordType,
    pub page: u32,
    pub per_page: u32,
}

impl RecordQuery {
    /// Single-page, single-result, exact-name lookup of one record type
    pub fn exact(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
            page: 1,
            per_page: 1,
        }
    }
}

/// A DNS record as held by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-assigned identifier
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Address literal
    pub content: String,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub proxied: Option<bool>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl DnsRecord {
    /// Whether the stored content already equals `address`
    ///
    /// Content is compared as a parsed address so that equivalent IPv6
    /// spellings (case, zero compression) match; unparsable content never does.
    pub fn has_content(&self, address: IpAddr) -> bool {
        self.content
            .trim()
            .parse::<IpAddr>()
            .is_ok_and(|current| current == address)
    }
}

/// Fields shared by A and AAAA record bodies
///
/// TTL, comment and proxied are pass-through metadata: `None` leaves the
/// provider default (create) or is omitted from the wire body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

/// Create/update request body, tagged by record type on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecordBody {
    #[serde(rename = "A")]
    A(RecordFields),
    #[serde(rename = "AAAA")]
    Aaaa(RecordFields),
}

impl RecordBody {
    /// Select the variant for `family`
    pub fn new(family: AddressFamily, fields: RecordFields) -> Self {
        match family {
            AddressFamily::V4 => RecordBody::A(fields),
            AddressFamily::V6 => RecordBody::Aaaa(fields),
        }
    }

    /// Body for a new record: name, type and content only
    pub fn create(family: AddressFamily, name: impl Into<String>, address: IpAddr) -> Self {
        Self::new(
            family,
            RecordFields {
                name: name.into(),
                content: address.to_string(),
                ttl: None,
                comment: None,
                proxied: None,
            },
        )
    }

    /// Body replacing only the content of `existing`, keeping its metadata
    pub fn replace_content(existing: &DnsRecord, address: IpAddr) -> Self {
        Self::new(
            existing.record_type.family(),
            RecordFields {
                name: existing.name.clone(),
                content: address.to_string(),
                ttl: existing.ttl,
                comment: existing.comment.clone(),
                proxied: existing.proxied,
            },
        )
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            RecordBody::A(_) => RecordType::A,
            RecordBody::Aaaa(_) => RecordType::Aaaa,
        }
    }

    pub fn fields(&self) -> &RecordFields {
        match self {
            RecordBody::A(fields) | RecordBody::Aaaa(fields) => fields,
        }
    }
}

/// Result of reconciling one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// Record was created (didn't exist before)
    Created,
    /// Record content was replaced
    Updated {
        /// Content before the update
        previous_content: String,
    },
    /// Record already had the desired content (no-op)
    Unchanged,
}

impl UpdateResult {
    /// Past-tense verb used in outcome log lines
    pub fn verb(&self) -> &'static str {
        match self {
            UpdateResult::Created => "created",
            UpdateResult::Updated { .. } => "updated",
            UpdateResult::Unchanged => "kept",
        }
    }

    /// Whether a write call was issued
    pub fn wrote(&self) -> bool {
        !matches!(self, UpdateResult::Unchanged)
    }
}

/// Trait for DNS provider implementations
///
/// One instance serves one account. Implementations issue exactly one API
/// call per method and never retry: the next scheduled cycle is the only
/// retry mechanism.
///
/// # Thread Safety
///
/// Implementations must be thread-safe; the engine calls them from many
/// concurrent tasks within one cycle.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List zones matching `query`
    async fn list_zones(&self, query: &ZoneQuery) -> Result<Vec<Zone>, crate::Error>;

    /// List records in `zone_id` matching `query`
    async fn list_records(
        &self,
        zone_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a record in `zone_id`
    async fn create_record(
        &self,
        zone_id: &str,
        body: &RecordBody,
    ) -> Result<DnsRecord, crate::Error>;

    /// Overwrite record `record_id` in `zone_id`
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        body: &RecordBody,
    ) -> Result<DnsRecord, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from account configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a provider bound to `account`'s credentials
    fn create(
        &self,
        account: &crate::config::AccountConfig,
    ) -> Result<Arc<dyn DnsProvider>, crate::Error>;
}
