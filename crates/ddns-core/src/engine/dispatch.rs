//! Fan-out of one cycle's reconciliation work
//!
//! One task per (account, zone) locates the zone, then spawns one task per
//! (record, tracked family) against the located zone. A change in either
//! family reconciles both, so a record of the unchanged family that drifted
//! is corrected too; matching records cost a lookup and no write. The gateway push runs
//! as its own task next to them. All tasks live in [`JoinSet`]s owned by the
//! cycle, so the cycle returns only after every task has finished, and
//! dropping the cycle aborts whatever is still in flight.
//!
//! A [`Semaphore`] bounds how many network steps run at once, and every step
//! is bounded by the task timeout. The zone-lookup permit is released before
//! record tasks are spawned.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::{EngineEvent, EventSink};
use crate::config::AccountConfig;
use crate::error::{Error, Result};
use crate::reconcile::reconcile_record;
use crate::state::{IpChangeSet, ObservedState};
use crate::traits::{AddressFamily, DnsProvider, FirewallGateway, UpdateResult};
use crate::zone::locate_zone;

/// One provider account and the records it keeps in sync
#[derive(Clone)]
pub struct AccountTarget {
    /// Label used in logs and reports (the account email)
    pub label: String,
    pub provider: Arc<dyn DnsProvider>,
    /// Zone name → record names
    pub zones: BTreeMap<String, Vec<String>>,
}

impl AccountTarget {
    pub fn new(
        label: impl Into<String>,
        provider: Arc<dyn DnsProvider>,
        zones: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            label: label.into(),
            provider,
            zones,
        }
    }

    /// Bind `provider` to the zones configured for `account`
    pub fn from_config(account: &AccountConfig, provider: Arc<dyn DnsProvider>) -> Self {
        Self::new(account.email.clone(), provider, account.zones.clone())
    }

    /// Number of configured record names across all zones
    pub fn record_count(&self) -> usize {
        self.zones.values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for AccountTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountTarget")
            .field("label", &self.label)
            .field("provider", &self.provider.provider_name())
            .field("zones", &self.zones)
            .finish()
    }
}

/// The gateway address group kept in sync with the IPv6 address
#[derive(Clone)]
pub struct GatewayTarget {
    pub gateway: Arc<dyn FirewallGateway>,
    pub group_id: String,
}

/// Outcome of one record tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleReport {
    pub account: String,
    pub zone: String,
    pub record: String,
    pub family: AddressFamily,
    pub outcome: std::result::Result<UpdateResult, String>,
}

/// A zone whose records were skipped because the lookup failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneFailure {
    pub account: String,
    pub zone: String,
    pub error: String,
}

/// Outcome of the gateway address-group push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReport {
    pub group_id: String,
    pub addresses: Vec<IpAddr>,
    pub outcome: std::result::Result<(), String>,
}

/// Everything one cycle's dispatch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub tuples: Vec<TupleReport>,
    pub skipped_zones: Vec<ZoneFailure>,
    pub gateway: Option<GatewayReport>,
    /// Tasks that panicked or were aborted before reporting
    pub lost_tasks: usize,
}

impl DispatchReport {
    /// Number of create/update calls that succeeded
    pub fn writes(&self) -> usize {
        self.tuples
            .iter()
            .filter(|t| matches!(&t.outcome, Ok(result) if result.wrote()))
            .count()
    }

    /// Number of failed tuples, skipped zones, failed pushes and lost tasks
    pub fn failures(&self) -> usize {
        let tuples = self.tuples.iter().filter(|t| t.outcome.is_err()).count();
        let gateway = self
            .gateway
            .as_ref()
            .is_some_and(|g| g.outcome.is_err()) as usize;
        tuples + self.skipped_zones.len() + gateway + self.lost_tasks
    }

    /// Find the report for one tuple
    pub fn tuple(&self, zone: &str, record: &str, family: AddressFamily) -> Option<&TupleReport> {
        self.tuples
            .iter()
            .find(|t| t.zone == zone && t.record == record && t.family == family)
    }
}

/// Shared per-cycle task settings
#[derive(Clone)]
pub(crate) struct TaskContext {
    pub(crate) limiter: Arc<Semaphore>,
    pub(crate) task_timeout: Duration,
    pub(crate) events: EventSink,
}

impl TaskContext {
    /// Run one network step under the concurrency bound and the timeout
    async fn bounded<T, F>(&self, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| Error::Other("task limiter closed".to_string()))?;

        match tokio::time::timeout(self.task_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "{} after {:?}",
                step, self.task_timeout
            ))),
        }
    }
}

enum TaskReport {
    Zone {
        tuples: Vec<TupleReport>,
        skipped: Option<ZoneFailure>,
        lost_tasks: usize,
    },
    Gateway(GatewayReport),
}

/// Launch and join every task for one cycle
pub(crate) async fn dispatch(
    accounts: &[AccountTarget],
    gateway: Option<&GatewayTarget>,
    changes: IpChangeSet,
    observed: &ObservedState,
    ctx: &TaskContext,
) -> DispatchReport {
    let targets: Vec<(AddressFamily, IpAddr)> = if changes.any() {
        observed.addresses().collect()
    } else {
        Vec::new()
    };

    let mut tasks = JoinSet::new();

    if !targets.is_empty() {
        for account in accounts {
            for (zone_name, records) in &account.zones {
                if records.is_empty() {
                    continue;
                }

                let job = ZoneJob {
                    account: account.label.clone(),
                    provider: Arc::clone(&account.provider),
                    zone_name: zone_name.clone(),
                    records: records.clone(),
                    targets: targets.clone(),
                };
                tasks.spawn(job.run(ctx.clone()));
            }
        }
    }

    if changes.ipv6
        && let (Some(target), Some(address)) = (gateway, observed.ipv6)
    {
        tasks.spawn(push_address_group(target.clone(), vec![address], ctx.clone()));
    }

    let mut report = DispatchReport::default();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(TaskReport::Zone {
                tuples,
                skipped,
                lost_tasks,
            }) => {
                report.tuples.extend(tuples);
                report.skipped_zones.extend(skipped);
                report.lost_tasks += lost_tasks;
            }
            Ok(TaskReport::Gateway(gateway)) => report.gateway = Some(gateway),
            Err(e) => {
                error!("Dispatch task did not complete: {}", e);
                report.lost_tasks += 1;
            }
        }
    }

    report
}

struct ZoneJob {
    account: String,
    provider: Arc<dyn DnsProvider>,
    zone_name: String,
    records: Vec<String>,
    targets: Vec<(AddressFamily, IpAddr)>,
}

impl ZoneJob {
    async fn run(self, ctx: TaskContext) -> TaskReport {
        let step = format!("zone lookup {}", self.zone_name);
        let located = ctx
            .bounded(&step, locate_zone(self.provider.as_ref(), &self.zone_name))
            .await;

        let zone = match located {
            Ok(zone) => Arc::new(zone),
            Err(e) => {
                if e.is_not_found() {
                    warn!("failed to find zone: {} (account {})", self.zone_name, self.account);
                } else {
                    warn!(
                        "failed to query zone: {} (account {}): {}",
                        self.zone_name, self.account, e
                    );
                }

                ctx.events.emit(EngineEvent::ZoneSkipped {
                    account: self.account.clone(),
                    zone: self.zone_name.clone(),
                    error: e.to_string(),
                });

                return TaskReport::Zone {
                    tuples: Vec::new(),
                    skipped: Some(ZoneFailure {
                        account: self.account,
                        zone: self.zone_name,
                        error: e.to_string(),
                    }),
                    lost_tasks: 0,
                };
            }
        };

        let mut records = JoinSet::new();

        for record in &self.records {
            for &(family, address) in &self.targets {
                let provider = Arc::clone(&self.provider);
                let zone = Arc::clone(&zone);
                let account = self.account.clone();
                let zone_name = self.zone_name.clone();
                let record = record.clone();
                let ctx = ctx.clone();

                records.spawn(async move {
                    let step = format!("{} record {}", family.record_type(), record);
                    let outcome = ctx
                        .bounded(
                            &step,
                            reconcile_record(provider.as_ref(), &zone, &record, family, address),
                        )
                        .await;

                    let event = match &outcome {
                        Ok(result) => EngineEvent::RecordReconciled {
                            account: account.clone(),
                            zone: zone_name.clone(),
                            record: record.clone(),
                            family,
                            result: result.clone(),
                        },
                        Err(e) => {
                            if matches!(e, Error::Timeout(_)) {
                                warn!("failed to reconcile: {}", e);
                            }
                            EngineEvent::RecordFailed {
                                account: account.clone(),
                                zone: zone_name.clone(),
                                record: record.clone(),
                                family,
                                error: e.to_string(),
                            }
                        }
                    };
                    ctx.events.emit(event);

                    TupleReport {
                        account,
                        zone: zone_name,
                        record,
                        family,
                        outcome: outcome.map_err(|e| e.to_string()),
                    }
                });
            }
        }

        let mut tuples = Vec::with_capacity(records.len());
        let mut lost_tasks = 0;

        while let Some(joined) = records.join_next().await {
            match joined {
                Ok(report) => tuples.push(report),
                Err(e) => {
                    error!("Record task in zone {} did not complete: {}", self.zone_name, e);
                    lost_tasks += 1;
                }
            }
        }

        TaskReport::Zone {
            tuples,
            skipped: None,
            lost_tasks,
        }
    }
}

async fn push_address_group(
    target: GatewayTarget,
    addresses: Vec<IpAddr>,
    ctx: TaskContext,
) -> TaskReport {
    let outcome = ctx
        .bounded(
            "gateway push",
            target
                .gateway
                .replace_address_group(&target.group_id, &addresses),
        )
        .await;

    match &outcome {
        Ok(()) => {
            info!(
                "updated {} address group {}: {:?}",
                target.gateway.gateway_name(),
                target.group_id,
                addresses
            );
            ctx.events.emit(EngineEvent::GatewayUpdated {
                group_id: target.group_id.clone(),
                addresses: addresses.clone(),
            });
        }
        Err(e) => {
            warn!(
                "failed to update {} address group {}: {}",
                target.gateway.gateway_name(),
                target.group_id,
                e
            );
            ctx.events.emit(EngineEvent::GatewayFailed {
                group_id: target.group_id.clone(),
                error: e.to_string(),
            });
        }
    }

    TaskReport::Gateway(GatewayReport {
        group_id: target.group_id,
        addresses,
        outcome: outcome.map_err(|e| e.to_string()),
    })
}
