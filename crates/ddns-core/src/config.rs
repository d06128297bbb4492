//! Configuration types for the DDNS system
//!
//! Settings are read once at startup from `settings.jsonc` (preferred) or
//! `settings.json` in the settings directory. Comments are allowed in either.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Settings file names, in lookup order
pub const SETTINGS_FILES: [&str; 2] = ["settings.jsonc", "settings.json"];

/// Default provider type for accounts that do not name one
pub const DEFAULT_PROVIDER: &str = "cloudflare";

/// Main daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Polling interval in minutes
    pub interval: u64,

    /// Whether the IPv6 address is tracked as well
    #[serde(default)]
    pub ipv6: bool,

    /// Gateway firewall address-group target
    #[serde(default)]
    pub unifi: GatewayConfig,

    /// DNS provider accounts and the records they own
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Settings {
    /// Load settings from `dir`, trying `settings.jsonc` before `settings.json`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        for file_name in SETTINGS_FILES {
            let path = dir.join(file_name);
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            tracing::debug!("Loading settings from {}", path.display());
            let settings = Self::from_jsonc_str(&raw)?;
            settings.validate()?;
            return Ok(settings);
        }

        Err(Error::config(format!(
            "failed to read settings.json(c) in {}",
            dir.display()
        )))
    }

    /// Parse settings from JSON text that may contain `//` and `/* */` comments
    pub fn from_jsonc_str(raw: &str) -> Result<Self> {
        let stripped = json_comments::StripComments::new(raw.as_bytes());
        Ok(serde_json::from_reader(stripped)?)
    }

    /// Polling interval as a duration
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval.saturating_mul(60))
    }

    /// Total number of (account, zone, record) entries
    pub fn record_count(&self) -> usize {
        self.accounts
            .iter()
            .flat_map(|account| account.zones.values())
            .map(Vec::len)
            .sum()
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(Error::config("interval must be > 0 minutes"));
        }

        for account in &self.accounts {
            account.validate()?;
        }

        self.unifi.validate()?;
        self.engine.validate()?;

        if self.record_count() == 0 && !self.unifi.enable {
            return Err(Error::config(
                "No records configured and gateway push disabled; nothing to do",
            ));
        }

        Ok(())
    }
}

/// One DNS provider account
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account identity (API email)
    pub email: String,

    /// Account secret (API key)
    /// ⚠️ NEVER log this value
    pub key: String,

    /// Zone name → record names kept in sync for that zone
    #[serde(default)]
    pub zones: BTreeMap<String, Vec<String>>,

    /// Provider type registered in the [`crate::ProviderRegistry`]
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl AccountConfig {
    /// Create an account for the default provider with no zones
    pub fn new(email: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            key: key.into(),
            zones: BTreeMap::new(),
            provider: default_provider(),
        }
    }

    /// Add a zone and the records to keep in sync inside it
    pub fn with_zone<I, S>(mut self, zone: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones
            .insert(zone.into(), records.into_iter().map(Into::into).collect());
        self
    }

    /// Validate the account
    pub fn validate(&self) -> Result<()> {
        if self.email.is_empty() {
            return Err(Error::config("account email cannot be empty"));
        }
        if self.key.is_empty() {
            return Err(Error::config(format!(
                "account {}: key cannot be empty",
                self.email
            )));
        }
        if self.provider.is_empty() {
            return Err(Error::config(format!(
                "account {}: provider cannot be empty",
                self.email
            )));
        }

        for (zone, records) in &self.zones {
            if zone.is_empty() {
                return Err(Error::config(format!(
                    "account {}: zone name cannot be empty",
                    self.email
                )));
            }

            // (account, zone, record, family) tuples must be unique
            let mut seen = HashSet::new();
            for record in records {
                if record.is_empty() {
                    return Err(Error::config(format!(
                        "account {}, zone {}: record name cannot be empty",
                        self.email, zone
                    )));
                }
                if !seen.insert(record.as_str()) {
                    return Err(Error::config(format!(
                        "account {}, zone {}: duplicate record {}",
                        self.email, zone, record
                    )));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("email", &self.email)
            .field("key", &"<REDACTED>")
            .field("zones", &self.zones)
            .field("provider", &self.provider)
            .finish()
    }
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

/// Gateway (UniFi) firewall address-group settings
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Whether the address-group push is enabled
    #[serde(default)]
    pub enable: bool,

    /// Gateway host (IP or name, no scheme)
    #[serde(default)]
    pub gateway: String,

    /// API key sent as `X-API-KEY`
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub token: String,

    /// Firewall group identifier
    #[serde(default, rename = "listID")]
    pub list_id: String,
}

impl GatewayConfig {
    /// Validate the gateway settings (only when enabled)
    pub fn validate(&self) -> Result<()> {
        if !self.enable {
            return Ok(());
        }
        if self.gateway.is_empty() {
            return Err(Error::config("unifi.gateway cannot be empty when enabled"));
        }
        if self.token.is_empty() {
            return Err(Error::config("unifi.token cannot be empty when enabled"));
        }
        if self.list_id.is_empty() {
            return Err(Error::config("unifi.listID cannot be empty when enabled"));
        }
        Ok(())
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enable", &self.enable)
            .field("gateway", &self.gateway)
            .field("token", &"<REDACTED>")
            .field("list_id", &self.list_id)
            .finish()
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for any single network step (zone lookup, record
    /// reconcile, gateway push, address resolution), in seconds
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Maximum number of network steps in flight during one cycle
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<()> {
        if self.task_timeout_secs == 0 {
            return Err(Error::config("engine.task_timeout_secs must be > 0"));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(Error::config("engine.max_concurrent_tasks must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("engine.event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: default_task_timeout_secs(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_task_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_tasks() -> usize {
    16
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
        // poll every five minutes
        "interval": 5,
        "ipv6": true,
        "unifi": {
            "enable": true,
            "gateway": "192.168.1.1",
            "token": "secret-token",
            "listID": "64f0c0ffee"
        },
        /* one account, two zones */
        "accounts": [
            {
                "email": "owner@example.com",
                "key": "secret-key",
                "zones": {
                    "example.com": ["home", "vpn"],
                    "example.org": ["example.org"]
                }
            }
        ]
    }
    "#;

    #[test]
    fn parses_commented_settings() {
        let settings = Settings::from_jsonc_str(SAMPLE).unwrap();

        assert_eq!(settings.interval, 5);
        assert!(settings.ipv6);
        assert!(settings.unifi.enable);
        assert_eq!(settings.unifi.list_id, "64f0c0ffee");
        assert_eq!(settings.accounts.len(), 1);
        assert_eq!(settings.accounts[0].provider, "cloudflare");
        assert_eq!(
            settings.accounts[0].zones["example.com"],
            vec!["home".to_string(), "vpn".to_string()]
        );
        assert_eq!(settings.record_count(), 3);
        assert_eq!(settings.engine.max_concurrent_tasks, 16);
        settings.validate().unwrap();
    }

    #[test]
    fn interval_is_minutes() {
        let settings = Settings::from_jsonc_str(SAMPLE).unwrap();
        assert_eq!(settings.interval(), std::time::Duration::from_secs(300));
    }

    #[test]
    fn unifi_block_is_optional() {
        let settings = Settings::from_jsonc_str(
            r#"{ "interval": 1, "accounts": [{ "email": "a@b.c", "key": "k", "zones": { "b.c": ["b.c"] } }] }"#,
        )
        .unwrap();

        assert!(!settings.unifi.enable);
        assert!(!settings.ipv6);
        settings.validate().unwrap();
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut settings = Settings::from_jsonc_str(SAMPLE).unwrap();
        settings.interval = 0;
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn duplicate_records_are_rejected() {
        let mut settings = Settings::from_jsonc_str(SAMPLE).unwrap();
        settings.accounts[0] = AccountConfig::new("owner@example.com", "secret-key")
            .with_zone("example.com", ["home", "home"]);
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn enabled_gateway_requires_list_id() {
        let mut settings = Settings::from_jsonc_str(SAMPLE).unwrap();
        settings.unifi.list_id.clear();
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        settings.unifi.enable = false;
        settings.validate().unwrap();
    }

    #[test]
    fn nothing_to_do_is_rejected() {
        let settings =
            Settings::from_jsonc_str(r#"{ "interval": 1, "accounts": [] }"#).unwrap();
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn secrets_not_exposed_in_debug() {
        let settings = Settings::from_jsonc_str(SAMPLE).unwrap();
        let debug_str = format!("{:?}", settings);

        assert!(!debug_str.contains("secret-key"));
        assert!(!debug_str.contains("secret-token"));
        assert!(debug_str.contains("owner@example.com"));
    }

    #[test]
    fn load_prefers_jsonc() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.jsonc"), SAMPLE).unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "interval": 60, "unifi": { "enable": true, "gateway": "g", "token": "t", "listID": "l" } }"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.interval, 5);
    }

    #[test]
    fn load_falls_back_to_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "interval": 60, "unifi": { "enable": true, "gateway": "g", "token": "t", "listID": "l" } }"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.interval, 60);
        assert!(settings.accounts.is_empty());
    }

    #[test]
    fn load_without_settings_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Settings::load(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn load_with_malformed_settings_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.jsonc"), "{ \"interval\": ").unwrap();
        assert!(matches!(Settings::load(dir.path()), Err(Error::Json(_))));
    }
}
