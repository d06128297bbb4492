//! Plugin-based provider registry
//!
//! DNS provider implementations register a factory under a type name. Each
//! configured account names its provider type (default `"cloudflare"`), and
//! the registry turns the account into a provider bound to its credentials.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! ddns_provider_cloudflare::register(&registry);
//!
//! for account in &settings.accounts {
//!     let provider = registry.create_provider(account)?;
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::AccountConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory};

/// Provider registry for plugin-based DNS provider creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. A poisoned lock still holds a consistent map
/// (inserts are the only writes), so it is recovered rather than propagated.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.insert(name.into(), factory);
    }

    /// Create the provider for `account`
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DnsProvider>)`: Provider bound to the account
    /// - `Err(Error::Config)`: The account names an unregistered provider type
    /// - `Err(Error)`: The factory rejected the account
    pub fn create_provider(&self, account: &AccountConfig) -> Result<Arc<dyn DnsProvider>> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let factory = providers.get(&account.provider).ok_or_else(|| {
            Error::config(format!(
                "Unknown provider type '{}' for account {}",
                account.provider, account.email
            ))
        })?;

        factory.create(account)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }
}
