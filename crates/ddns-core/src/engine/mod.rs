//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Resolving the public addresses on every tick
//! - Detecting which address families changed
//! - Fanning reconciliation out across accounts, zones and records
//! - Pushing the IPv6 address to the gateway address group
//!
//! ## Architecture
//!
//! ```text
//!        tick
//!         │
//!         ▼
//! ┌──────────────────┐   resolve(V4/V6)   ┌─────────────────┐
//! │    DdnsEngine    │───────────────────▶│ AddressResolver │
//! │  (observed state │                    └─────────────────┘
//! │   single owner)  │
//! └──────────────────┘
//!         │ detect() → IpChangeSet
//!         ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ dispatch (JoinSet, bounded by Semaphore + timeout)       │
//! │   account × zone ── locate_zone ── record × family ──┐   │
//! │                                        reconcile_record  │
//! │   gateway push (only when IPv6 changed)                  │
//! └──────────────────────────────────────────────────────────┘
//!         │
//!         ▼
//!   CycleReport + EngineEvents
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve IPv4; failure aborts the cycle and keeps the observed state
//! 2. Resolve IPv6 if tracked; failure keeps the previous IPv6 value
//! 3. Compare against the observed state
//! 4. If anything changed, dispatch and join every task
//! 5. Hand the new observed state back to the run loop

mod dispatch;

pub use dispatch::{
    AccountTarget, DispatchReport, GatewayReport, GatewayTarget, TupleReport, ZoneFailure,
};

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::detector::detect;
use crate::error::{Error, Result};
use crate::state::{IpChangeSet, ObservedState};
use crate::traits::{AddressFamily, AddressResolver, FirewallGateway, UpdateResult};
use dispatch::TaskContext;

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        accounts: usize,
        records: usize,
        interval: Duration,
    },

    /// Address resolution failed for one family
    ResolutionFailed {
        family: AddressFamily,
        error: String,
    },

    /// A family's address differs from the observed state
    AddressChanged {
        family: AddressFamily,
        previous: Option<IpAddr>,
        address: IpAddr,
    },

    /// Zone lookup failed; its records were not reconciled
    ZoneSkipped {
        account: String,
        zone: String,
        error: String,
    },

    /// A record tuple was created, updated or already correct
    RecordReconciled {
        account: String,
        zone: String,
        record: String,
        family: AddressFamily,
        result: UpdateResult,
    },

    /// A record tuple failed
    RecordFailed {
        account: String,
        zone: String,
        record: String,
        family: AddressFamily,
        error: String,
    },

    /// Gateway address group replaced
    GatewayUpdated {
        group_id: String,
        addresses: Vec<IpAddr>,
    },

    /// Gateway address group push failed
    GatewayFailed { group_id: String, error: String },

    /// A cycle finished (resolution succeeded)
    CycleCompleted {
        changes: IpChangeSet,
        writes: usize,
        failures: usize,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// Non-blocking sender for [`EngineEvent`]s
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSink {
    pub(crate) fn emit(&self, event: EngineEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing engine.event_channel_capacity.");
            }
            // Nobody is listening; events are optional
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Report for one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub changes: IpChangeSet,
    pub dispatch: DispatchReport,
}

/// Result of [`DdnsEngine::run_cycle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Observed state to carry into the next cycle
    pub observed: ObservedState,
    pub report: CycleReport,
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`] or [`DdnsEngine::run_until()`]
/// 3. The first cycle runs immediately, then once per interval
/// 4. Shutdown cancels the cycle in flight, if any
///
/// ## State
///
/// The observed state lives in the run loop and is replaced only after a
/// cycle's detection step. Every cycle joins its tasks before returning, so
/// no task from an earlier cycle can run concurrently with detection.
pub struct DdnsEngine {
    resolver: Arc<dyn AddressResolver>,
    accounts: Vec<AccountTarget>,
    gateway: Option<GatewayTarget>,
    track_ipv6: bool,
    interval: Duration,
    task_timeout: Duration,
    context: TaskContext,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: Public address resolver
    /// - `accounts`: Provider accounts with their zones and records
    /// - `gateway`: Gateway client, required when `settings.unifi.enable`
    /// - `settings`: Daemon settings
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: Arc<dyn AddressResolver>,
        accounts: Vec<AccountTarget>,
        gateway: Option<Arc<dyn FirewallGateway>>,
        settings: &Settings,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        settings.validate()?;

        let gateway = match (settings.unifi.enable, gateway) {
            (true, Some(gateway)) => Some(GatewayTarget {
                gateway,
                group_id: settings.unifi.list_id.clone(),
            }),
            (true, None) => {
                return Err(Error::config(
                    "unifi.enable is set but no gateway client was supplied",
                ));
            }
            (false, Some(_)) => {
                warn!("Gateway client supplied but unifi.enable is false, ignoring it");
                None
            }
            (false, None) => None,
        };

        if gateway.is_some() && !settings.ipv6 {
            warn!("Gateway push is enabled but IPv6 tracking is off; the address group will never be updated");
        }

        let (tx, rx) = mpsc::channel(settings.engine.event_channel_capacity);
        let task_timeout = Duration::from_secs(settings.engine.task_timeout_secs);

        let engine = Self {
            resolver,
            accounts,
            gateway,
            track_ipv6: settings.ipv6,
            interval: settings.interval(),
            task_timeout,
            context: TaskContext {
                limiter: Arc::new(Semaphore::new(settings.engine.max_concurrent_tasks)),
                task_timeout,
                events: EventSink { tx },
            },
        };

        Ok((engine, rx))
    }

    /// Run the engine until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the engine until `shutdown` resolves
    ///
    /// The first cycle starts immediately. A shutdown that arrives while a
    /// cycle is in flight cancels it; record writes are independently
    /// idempotent, so the next start converges again.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.context.events.emit(EngineEvent::Started {
            accounts: self.accounts.len(),
            records: self.accounts.iter().map(AccountTarget::record_count).sum(),
            interval: self.interval,
        });
        info!("interval set to {} minutes", self.interval.as_secs() / 60);

        tokio::pin!(shutdown);

        let mut observed = ObservedState::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => break,
            }

            tokio::select! {
                outcome = self.run_cycle(&observed) => match outcome {
                    Ok(outcome) => observed = outcome.observed,
                    Err(e) => error!("Cycle aborted: {}", e),
                },
                _ = &mut shutdown => {
                    warn!("Shutdown during cycle, cancelling in-flight tasks");
                    break;
                }
            }
        }

        info!("Shutdown signal received, engine stopped");
        self.context.events.emit(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Run one cycle against `observed`
    ///
    /// # Returns
    ///
    /// - `Ok(CycleOutcome)`: The replacement observed state and what was done
    /// - `Err(Error)`: IPv4 resolution failed; nothing was dispatched and
    ///   `observed` stays authoritative
    pub async fn run_cycle(&self, observed: &ObservedState) -> Result<CycleOutcome> {
        let started_at = Utc::now();

        let ipv4 = match self.resolve(AddressFamily::V4).await {
            Ok(address) => address,
            Err(e) => {
                error!("failed to get ipv4: {}", e);
                self.context.events.emit(EngineEvent::ResolutionFailed {
                    family: AddressFamily::V4,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let ipv6 = if self.track_ipv6 {
            match self.resolve(AddressFamily::V6).await {
                Ok(address) => Some(address),
                Err(e) => {
                    warn!(
                        "failed to get ipv6, keeping {:?}: {}",
                        observed.ipv6, e
                    );
                    self.context.events.emit(EngineEvent::ResolutionFailed {
                        family: AddressFamily::V6,
                        error: e.to_string(),
                    });
                    observed.ipv6
                }
            }
        } else {
            None
        };

        let (changes, next) = detect(ipv4, ipv6, observed);

        let dispatch = if changes.any() {
            for family in changes.families() {
                if let Some(address) = next.get(family) {
                    info!("new {}: {}", family, address);
                    self.context.events.emit(EngineEvent::AddressChanged {
                        family,
                        previous: observed.get(family),
                        address,
                    });
                }
            }

            dispatch::dispatch(
                &self.accounts,
                self.gateway.as_ref(),
                changes,
                &next,
                &self.context,
            )
            .await
        } else {
            debug!("No address change ({})", ipv4);
            DispatchReport::default()
        };

        let finished_at = Utc::now();
        debug!(
            "Cycle finished in {}ms: {} write(s), {} failure(s)",
            (finished_at - started_at).num_milliseconds(),
            dispatch.writes(),
            dispatch.failures()
        );

        self.context.events.emit(EngineEvent::CycleCompleted {
            changes,
            writes: dispatch.writes(),
            failures: dispatch.failures(),
        });

        Ok(CycleOutcome {
            observed: next,
            report: CycleReport {
                started_at,
                finished_at,
                changes,
                dispatch,
            },
        })
    }

    /// Resolve one family, bounded by the task timeout
    async fn resolve(&self, family: AddressFamily) -> Result<IpAddr> {
        let address = tokio::time::timeout(self.task_timeout, self.resolver.resolve(family))
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "{} resolution via {} after {:?}",
                    family,
                    self.resolver.resolver_name(),
                    self.task_timeout
                ))
            })??;

        if !family.matches(address) {
            return Err(Error::ip_source(format!(
                "{} returned {} for {}",
                self.resolver.resolver_name(),
                address,
                family
            )));
        }

        Ok(address)
    }
}
