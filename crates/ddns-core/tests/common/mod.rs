//! Test doubles and common utilities for contract tests
//!
//! The doubles keep real in-memory state so that the tests can assert on
//! what a provider or gateway ends up holding, not only on call counts.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{AccountConfig, EngineConfig, GatewayConfig, Settings};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{
    AddressFamily, AddressResolver, DnsProvider, DnsRecord, FirewallGateway, RecordBody,
    RecordQuery, RecordType, Zone, ZoneQuery,
};
use ddns_core::{AccountTarget, DdnsEngine, EngineEvent};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// A write call as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create {
        zone_id: String,
        body: RecordBody,
    },
    Update {
        zone_id: String,
        record_id: String,
        body: RecordBody,
    },
}

impl Write {
    pub fn body(&self) -> &RecordBody {
        match self {
            Write::Create { body, .. } | Write::Update { body, .. } => body,
        }
    }

    pub fn record_name(&self) -> &str {
        &self.body().fields().name
    }
}

#[derive(Default)]
struct Backend {
    zones: Vec<Zone>,
    records: Vec<(String, DnsRecord)>,
    failing_zones: HashSet<String>,
    failing_records: HashSet<String>,
    next_id: usize,
    zone_lookups: usize,
    record_lookups: usize,
    writes: Vec<Write>,
}

/// An in-memory DnsProvider
///
/// Clones share the same backend, so a test can keep a handle while the
/// engine owns another.
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    backend: Arc<Mutex<Backend>>,
    zone_delay: Arc<Mutex<Option<Duration>>>,
    record_delay: Arc<Mutex<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active zone; its id is `zone-<name>`
    pub fn with_zone(self, name: &str) -> Self {
        self.backend.lock().unwrap().zones.push(Zone {
            id: format!("zone-{}", name),
            name: name.to_string(),
        });
        self
    }

    /// Seed an existing record
    pub fn with_record(self, zone: &str, record: DnsRecord) -> Self {
        self.backend
            .lock()
            .unwrap()
            .records
            .push((format!("zone-{}", zone), record));
        self
    }

    /// Make zone lookups for `name` fail with a transport error
    pub fn fail_zone(&self, name: &str) {
        self.backend
            .lock()
            .unwrap()
            .failing_zones
            .insert(name.to_string());
    }

    /// Make record lookups for `name` fail with a transport error
    pub fn fail_record(&self, name: &str) {
        self.backend
            .lock()
            .unwrap()
            .failing_records
            .insert(name.to_string());
    }

    /// Delay every zone lookup
    pub fn delay_zone_lookups(&self, delay: Duration) {
        *self.zone_delay.lock().unwrap() = Some(delay);
    }

    /// Delay every record lookup
    pub fn delay_record_lookups(&self, delay: Duration) {
        *self.record_delay.lock().unwrap() = Some(delay);
    }

    /// Highest number of record lookups observed running at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Overwrite a record's content out of band
    pub fn set_content(&self, zone: &str, name: &str, record_type: RecordType, content: &str) {
        let zone_id = format!("zone-{}", zone);
        let mut backend = self.backend.lock().unwrap();
        for (id, record) in backend.records.iter_mut() {
            if *id == zone_id && record.name == name && record.record_type == record_type {
                record.content = content.to_string();
            }
        }
    }

    pub fn record(&self, zone: &str, name: &str, record_type: RecordType) -> Option<DnsRecord> {
        let zone_id = format!("zone-{}", zone);
        self.backend
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|(id, r)| *id == zone_id && r.name == name && r.record_type == record_type)
            .map(|(_, r)| r.clone())
    }

    pub fn record_count(&self) -> usize {
        self.backend.lock().unwrap().records.len()
    }

    pub fn zone_lookups(&self) -> usize {
        self.backend.lock().unwrap().zone_lookups
    }

    pub fn record_lookups(&self) -> usize {
        self.backend.lock().unwrap().record_lookups
    }

    pub fn writes(&self) -> Vec<Write> {
        self.backend.lock().unwrap().writes.clone()
    }

    pub fn creates(&self) -> usize {
        self.writes()
            .iter()
            .filter(|w| matches!(w, Write::Create { .. }))
            .count()
    }

    pub fn updates(&self) -> usize {
        self.writes()
            .iter()
            .filter(|w| matches!(w, Write::Update { .. }))
            .count()
    }

    pub fn clear_writes(&self) {
        self.backend.lock().unwrap().writes.clear();
    }
}

pub fn record(name: &str, record_type: RecordType, content: &str) -> DnsRecord {
    DnsRecord {
        id: format!("rec-{}-{}", name, record_type),
        name: name.to_string(),
        record_type,
        content: content.to_string(),
        ttl: None,
        proxied: None,
        comment: None,
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_zones(&self, query: &ZoneQuery) -> Result<Vec<Zone>> {
        let delay = *self.zone_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut backend = self.backend.lock().unwrap();
        backend.zone_lookups += 1;

        if backend.failing_zones.contains(&query.name) {
            return Err(Error::http(format!("connection reset listing {}", query.name)));
        }

        Ok(backend
            .zones
            .iter()
            .filter(|z| z.name == query.name)
            .take(query.per_page as usize)
            .cloned()
            .collect())
    }

    async fn list_records(&self, zone_id: &str, query: &RecordQuery) -> Result<Vec<DnsRecord>> {
        let delay = *self.record_delay.lock().unwrap();
        if let Some(delay) = delay {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        let mut backend = self.backend.lock().unwrap();
        backend.record_lookups += 1;

        if backend.failing_records.contains(&query.name) {
            return Err(Error::http(format!("connection reset listing {}", query.name)));
        }

        Ok(backend
            .records
            .iter()
            .filter(|(id, r)| {
                id == zone_id && r.name == query.name && r.record_type == query.record_type
            })
            .take(query.per_page as usize)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_record(&self, zone_id: &str, body: &RecordBody) -> Result<DnsRecord> {
        let mut backend = self.backend.lock().unwrap();
        backend.next_id += 1;

        let fields = body.fields();
        let created = DnsRecord {
            id: format!("new-{}", backend.next_id),
            name: fields.name.clone(),
            record_type: body.record_type(),
            content: fields.content.clone(),
            ttl: fields.ttl.or(Some(1)),
            proxied: fields.proxied.or(Some(false)),
            comment: fields.comment.clone(),
        };

        backend.records.push((zone_id.to_string(), created.clone()));
        backend.writes.push(Write::Create {
            zone_id: zone_id.to_string(),
            body: body.clone(),
        });
        Ok(created)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        body: &RecordBody,
    ) -> Result<DnsRecord> {
        let mut backend = self.backend.lock().unwrap();
        backend.writes.push(Write::Update {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            body: body.clone(),
        });

        let fields = body.fields();
        let (_, record) = backend
            .records
            .iter_mut()
            .find(|(id, r)| id == zone_id && r.id == record_id)
            .ok_or_else(|| Error::not_found(format!("record {}", record_id)))?;

        record.content = fields.content.clone();
        record.ttl = fields.ttl;
        record.comment = fields.comment.clone();
        record.proxied = fields.proxied;
        Ok(record.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// An AddressResolver whose answers are set by the test
#[derive(Clone, Default)]
pub struct ScriptedResolver {
    answers: Arc<Mutex<HashMap<AddressFamily, std::result::Result<IpAddr, String>>>>,
    hanging: Arc<Mutex<HashSet<AddressFamily>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new(ipv4: IpAddr) -> Self {
        let resolver = Self::default();
        resolver.set(AddressFamily::V4, ipv4);
        resolver
    }

    pub fn with_ipv6(self, ipv6: IpAddr) -> Self {
        self.set(AddressFamily::V6, ipv6);
        self
    }

    pub fn set(&self, family: AddressFamily, address: IpAddr) {
        self.answers.lock().unwrap().insert(family, Ok(address));
    }

    pub fn fail(&self, family: AddressFamily, message: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(family, Err(message.to_string()));
    }

    /// Never answer for `family`
    pub fn hang(&self, family: AddressFamily) {
        self.hanging.lock().unwrap().insert(family);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressResolver for ScriptedResolver {
    async fn resolve(&self, family: AddressFamily) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let hangs = self.hanging.lock().unwrap().contains(&family);
        if hangs {
            std::future::pending::<()>().await;
        }

        match self.answers.lock().unwrap().get(&family) {
            Some(Ok(address)) => Ok(*address),
            Some(Err(message)) => Err(Error::ip_source(message.clone())),
            None => Err(Error::ip_source(format!("no {} answer scripted", family))),
        }
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// A FirewallGateway that records every push
#[derive(Clone, Default)]
pub struct MockGateway {
    pushes: Arc<Mutex<Vec<(String, Vec<IpAddr>)>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn pushes(&self) -> Vec<(String, Vec<IpAddr>)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl FirewallGateway for MockGateway {
    async fn replace_address_group(&self, group_id: &str, addresses: &[IpAddr]) -> Result<()> {
        self.pushes
            .lock()
            .unwrap()
            .push((group_id.to_string(), addresses.to_vec()));

        if *self.failing.lock().unwrap() {
            return Err(Error::gateway("api.err.Invalid"));
        }
        Ok(())
    }

    fn gateway_name(&self) -> &'static str {
        "mock"
    }
}

/// Settings with one minute interval and the given accounts
pub fn settings(ipv6: bool, accounts: Vec<AccountConfig>) -> Settings {
    Settings {
        interval: 1,
        ipv6,
        unifi: GatewayConfig::default(),
        accounts,
        engine: EngineConfig::default(),
    }
}

/// Settings with the gateway push enabled for group `group-1`
pub fn settings_with_gateway(ipv6: bool, accounts: Vec<AccountConfig>) -> Settings {
    let mut settings = settings(ipv6, accounts);
    settings.unifi = GatewayConfig {
        enable: true,
        gateway: "192.168.1.1".to_string(),
        token: "token".to_string(),
        list_id: "group-1".to_string(),
    };
    settings
}

/// Build an engine whose accounts are all served by `provider`
pub fn engine(
    resolver: &ScriptedResolver,
    provider: &MockDnsProvider,
    gateway: Option<&MockGateway>,
    settings: &Settings,
) -> (DdnsEngine, mpsc::Receiver<EngineEvent>) {
    let accounts = settings
        .accounts
        .iter()
        .map(|account| AccountTarget::from_config(account, Arc::new(provider.clone())))
        .collect();

    let gateway = gateway.map(|g| Arc::new(g.clone()) as Arc<dyn FirewallGateway>);

    DdnsEngine::new(Arc::new(resolver.clone()), accounts, gateway, settings)
        .expect("engine construction succeeds")
}

/// Collect every event currently buffered
pub fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
