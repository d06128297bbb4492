// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS system.
//
// ## Behavior
//
// - One HTTP request per trait call, no retries (the next cycle retries)
// - Account authentication with `X-Auth-Email` / `X-Auth-Key`
// - HTTP timeout configured (30 seconds)
// - Status codes mapped to typed errors (401/403, 404, 429, 5xx)
// - Both A and AAAA records
//
// ## Security Requirements
//
// - The API key NEVER appears in logs or Debug output
// - Provider creation fails fast if email or key is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...&status=active&page=1&per_page=1`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name.exact=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::AccountConfig;
use ddns_core::traits::{
    DnsProvider, DnsProviderFactory, DnsRecord, RecordBody, RecordQuery, Zone, ZoneQuery,
};
use ddns_core::{Error, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

impl<T> Envelope<T> {
    fn into_result(self, action: &str) -> Result<T> {
        if !self.success {
            let messages: Vec<String> = self
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect();
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} rejected: {}", action, messages.join("; ")),
            ));
        }

        self.result.ok_or_else(|| {
            Error::provider(
                PROVIDER_NAME,
                format!("{}: response has no result", action),
            )
        })
    }
}

/// Cloudflare DNS provider bound to one account
///
/// Stateless apart from the HTTP client; every call is a single request.
pub struct CloudflareProvider {
    /// Account email
    email: String,

    /// Global API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("email", &self.email)
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider for the public Cloudflare API
    ///
    /// # Errors
    ///
    /// `Error::Config` if `email` or `api_key` is empty, `Error::Http` if
    /// the HTTP client cannot be built.
    pub fn new(email: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(email, api_key, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against another API base URL
    pub fn with_base_url(
        email: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let email = email.into();
        let api_key = api_key.into();

        if email.is_empty() {
            return Err(Error::config("Cloudflare account email cannot be empty"));
        }
        if api_key.is_empty() {
            return Err(Error::config(format!(
                "Cloudflare API key for {} cannot be empty",
                email
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            email,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Auth-Email", &self.email)
            .header("X-Auth-Key", &self.api_key)
    }

    /// Send `request` and unwrap the v4 envelope
    async fn send<T: DeserializeOwned>(&self, action: &str, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: request failed: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(action, status, &error_text));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            Error::provider(
                PROVIDER_NAME,
                format!("{}: failed to parse response: {}", action, e),
            )
        })?;

        envelope.into_result(action)
    }
}

/// Map a non-success HTTP status to a typed error
fn status_error(action: &str, status: StatusCode, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API key or insufficient permissions ({})",
            action, status
        )),
        404 => Error::not_found(format!("{}: {}", action, status)),
        429 => Error::rate_limited(format!("{}: {}", action, status)),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("{}: server error (transient): {} - {}", action, status, body),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{}: {} - {}", action, status, body),
        ),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_zones(&self, query: &ZoneQuery) -> Result<Vec<Zone>> {
        tracing::debug!("Looking up zone: {}", query.name);

        let page = query.page.to_string();
        let per_page = query.per_page.to_string();
        let request = self.request(Method::GET, "/zones").query(&[
            ("name", query.name.as_str()),
            ("status", query.status.as_str()),
            ("page", page.as_str()),
            ("per_page", per_page.as_str()),
        ]);

        self.send("zone lookup", request).await
    }

    async fn list_records(&self, zone_id: &str, query: &RecordQuery) -> Result<Vec<DnsRecord>> {
        tracing::debug!(
            "Looking up record: {} (type: {})",
            query.name,
            query.record_type
        );

        let page = query.page.to_string();
        let per_page = query.per_page.to_string();
        let request = self
            .request(Method::GET, &format!("/zones/{}/dns_records", zone_id))
            .query(&[
                ("type", query.record_type.as_str()),
                ("name.exact", query.name.as_str()),
                ("page", page.as_str()),
                ("per_page", per_page.as_str()),
            ]);

        self.send("record lookup", request).await
    }

    async fn create_record(&self, zone_id: &str, body: &RecordBody) -> Result<DnsRecord> {
        let request = self
            .request(Method::POST, &format!("/zones/{}/dns_records", zone_id))
            .json(body);

        self.send("record create", request).await
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        body: &RecordBody,
    ) -> Result<DnsRecord> {
        let request = self
            .request(
                Method::PUT,
                &format!("/zones/{}/dns_records/{}", zone_id, record_id),
            )
            .json(body);

        self.send("record update", request).await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, account: &AccountConfig) -> Result<Arc<dyn DnsProvider>> {
        let provider = CloudflareProvider::new(account.email.clone(), account.key.clone())?;
        Ok(Arc::new(provider))
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let account = AccountConfig::new("ops@example.com", "test_key");

        let provider = CloudflareFactory.create(&account);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().provider_name(), "cloudflare");
    }

    #[test]
    fn test_factory_missing_key() {
        let account = AccountConfig::new("ops@example.com", "");

        let err = CloudflareFactory.create(&account).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_api_key_not_exposed_in_debug() {
        let provider = CloudflareProvider::new("ops@example.com", "secret_key_12345").unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(debug_str.contains("CloudflareProvider"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider =
            CloudflareProvider::with_base_url("ops@example.com", "key", "http://127.0.0.1:1/")
                .unwrap();
        assert_eq!(provider.base_url, "http://127.0.0.1:1");
    }

    #[test]
    fn test_status_mapping() {
        let auth = status_error("zone lookup", StatusCode::FORBIDDEN, "");
        assert!(matches!(auth, Error::Authentication(_)));

        let missing = status_error("zone lookup", StatusCode::NOT_FOUND, "");
        assert!(missing.is_not_found());

        let limited = status_error("zone lookup", StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(limited, Error::RateLimited(_)));

        let transient = status_error("zone lookup", StatusCode::BAD_GATEWAY, "upstream");
        assert!(transient.to_string().contains("transient"));

        let other = status_error("record create", StatusCode::BAD_REQUEST, "{\"errors\":[]}");
        assert!(other.to_string().contains("{\"errors\":[]}"));
    }

    #[test]
    fn test_failed_envelope_lists_errors() {
        let envelope: Envelope<Vec<Zone>> = serde_json::from_str(
            r#"{"success":false,"errors":[{"code":9103,"message":"Unknown X-Auth-Key"}],"result":null}"#,
        )
        .unwrap();

        let err = envelope.into_result("zone lookup").unwrap_err();
        assert!(err.to_string().contains("Unknown X-Auth-Key (9103)"));
    }
}
