// # HTTP Address Resolver
//
// This crate provides an HTTP-based public address resolver for the DDNS
// system.
//
// ## Architecture
//
// Each `resolve` call issues one plain-text GET against an ipify endpoint:
// `api.ipify.org` for IPv4 and `api64.ipify.org` for IPv6. The dual-stack
// endpoint answers over IPv4 when the host has no IPv6 egress, so an IPv4
// literal in an IPv6 answer is reported as a failure rather than accepted.
//
// No caching and no background polling: the engine's interval drives every
// request.

use ddns_core::traits::{AddressFamily, AddressResolver};
use ddns_core::{Error, Result};

use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Plain-text IPv4 endpoint
pub const IPIFY_V4: &str = "http://api.ipify.org?format=text";

/// Plain-text dual-stack endpoint, preferring IPv6
pub const IPIFY_V6: &str = "http://api64.ipify.org?format=text";

/// Default HTTP timeout for address lookups (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Strict dotted-quad, each octet 0-255
const IPV4_PATTERN: &str = r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$";

/// Public address resolver backed by ipify
pub struct HttpAddressResolver {
    /// Endpoint for IPv4 lookups
    v4_url: String,

    /// Endpoint for IPv6 lookups
    v6_url: String,

    ipv4_pattern: Regex,

    /// HTTP client
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpAddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAddressResolver")
            .field("v4_url", &self.v4_url)
            .field("v6_url", &self.v6_url)
            .finish()
    }
}

impl HttpAddressResolver {
    /// Create a resolver against the public ipify endpoints
    pub fn new() -> Result<Self> {
        Self::with_endpoints(IPIFY_V4, IPIFY_V6)
    }

    /// Create a resolver against other endpoints
    ///
    /// # Parameters
    ///
    /// - `v4_url`: URL answering with the caller's IPv4 address as plain text
    /// - `v6_url`: URL answering with the caller's IPv6 address as plain text
    pub fn with_endpoints(v4_url: impl Into<String>, v6_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let ipv4_pattern = Regex::new(IPV4_PATTERN)
            .map_err(|e| Error::Other(format!("invalid IPv4 pattern: {}", e)))?;

        Ok(Self {
            v4_url: v4_url.into(),
            v6_url: v6_url.into(),
            ipv4_pattern,
            client,
        })
    }

    /// Fetch the trimmed response body from `url`
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response from {}: {}", url, e)))?;

        Ok(text.trim().to_string())
    }

    /// Interpret a response body for `family`
    fn parse(&self, family: AddressFamily, body: &str) -> Result<IpAddr> {
        let looks_v4 = self.ipv4_pattern.is_match(body);

        match family {
            AddressFamily::V4 => {
                if !looks_v4 {
                    return Err(Error::ip_source(format!("invalid ipv4 address: {:?}", body)));
                }
                body.parse::<Ipv4Addr>()
                    .map(IpAddr::V4)
                    .map_err(|e| Error::ip_source(format!("invalid ipv4 address {:?}: {}", body, e)))
            }
            AddressFamily::V6 => {
                if looks_v4 {
                    return Err(Error::ip_source(format!(
                        "no ipv6 connectivity (answered with {})",
                        body
                    )));
                }
                body.parse::<Ipv6Addr>()
                    .map(IpAddr::V6)
                    .map_err(|e| Error::ip_source(format!("invalid ipv6 address {:?}: {}", body, e)))
            }
        }
    }
}

#[async_trait::async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self, family: AddressFamily) -> Result<IpAddr> {
        let url = match family {
            AddressFamily::V4 => &self.v4_url,
            AddressFamily::V6 => &self.v6_url,
        };

        let body = self.fetch(url).await?;
        let address = self.parse(family, &body)?;

        tracing::debug!("Resolved {} address {} via {}", family, address, url);
        Ok(address)
    }

    fn resolver_name(&self) -> &'static str {
        "ipify"
    }
}
