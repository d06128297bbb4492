// # UniFi Gateway
//
// This crate replaces the members of a UniFi firewall address group through
// the gateway's local network API.
//
// ## API Call
//
// ```http
// PUT https://{gateway}/proxy/network/api/s/default/rest/firewallgroup/{group_id}
// X-API-KEY: <token>
// Accept: application/json
// Content-Type: application/json
//
// {"group_members": ["2001:db8::1"]}
// ```
//
// Only HTTP 200 counts as success; any other status fails with the
// response body as the message.
//
// ## Security
//
// UniFi gateways serve a self-signed certificate, so certificate
// verification is disabled for this client. The token never appears in logs.

use async_trait::async_trait;
use ddns_core::config::GatewayConfig;
use ddns_core::traits::FirewallGateway;
use ddns_core::{Error, Result};
use reqwest::StatusCode;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

/// Default HTTP timeout for gateway requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const FIREWALL_GROUP_PATH: &str = "/proxy/network/api/s/default/rest/firewallgroup";

#[derive(Debug, Serialize)]
struct GroupMembers {
    group_members: Vec<String>,
}

/// UniFi gateway client
pub struct UnifiGateway {
    /// `https://{gateway}` or an override, without trailing slash
    base_url: String,

    /// API key sent as `X-API-KEY`
    /// ⚠️ NEVER log this value
    token: String,

    client: reqwest::Client,
}

impl std::fmt::Debug for UnifiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiGateway")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl UnifiGateway {
    /// Create a client for the gateway at `host` (IP or name, no scheme)
    pub fn new(host: &str, token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(format!("https://{}", host), token)
    }

    /// Create a client from the `unifi` settings block
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        if config.gateway.is_empty() {
            return Err(Error::config("unifi.gateway cannot be empty"));
        }
        Self::new(&config.gateway, config.token.clone())
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::config("UniFi API token cannot be empty"));
        }

        let base_url = base_url.into().trim_end_matches('/').to_string();

        tracing::warn!(
            "TLS certificate verification is disabled for the UniFi gateway at {}",
            base_url
        );

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    fn group_url(&self, group_id: &str) -> String {
        format!("{}{}/{}", self.base_url, FIREWALL_GROUP_PATH, group_id)
    }
}

#[async_trait]
impl FirewallGateway for UnifiGateway {
    async fn replace_address_group(&self, group_id: &str, addresses: &[IpAddr]) -> Result<()> {
        let body = GroupMembers {
            group_members: addresses.iter().map(IpAddr::to_string).collect(),
        };

        tracing::debug!("Replacing UniFi firewall group {}: {:?}", group_id, body.group_members);

        let response = self
            .client
            .put(self.group_url(group_id))
            .header("X-API-KEY", &self.token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::http(format!("UniFi request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(Error::gateway(error_text));
        }

        Ok(())
    }

    fn gateway_name(&self) -> &'static str {
        "unifi"
    }
}
