// # ddns-core
//
// Core library for the polling DDNS reconciler.
//
// ## Architecture Overview
//
// Each cycle resolves the public addresses, compares them with the last
// observed ones and, for every family that changed, brings each configured
// record in line with the new address:
// - **AddressResolver**: Trait for discovering the current public address
// - **DnsProvider**: Trait for listing zones and reading/writing records
// - **FirewallGateway**: Trait for replacing a gateway address group
// - **DdnsEngine**: Interval loop, change detection and bounded fan-out
// - **ProviderRegistry**: Plugin-based registry for DNS providers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plugin-Based**: Providers are registered by name, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Records whose content already matches are never written

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod state;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{AccountConfig, EngineConfig, GatewayConfig, Settings};
pub use engine::{AccountTarget, CycleOutcome, CycleReport, DdnsEngine, EngineEvent};
pub use error::{Error, Result};
pub use registry::ProviderRegistry;
pub use state::{IpChangeSet, ObservedState};
pub use traits::{AddressFamily, AddressResolver, DnsProvider, FirewallGateway};
