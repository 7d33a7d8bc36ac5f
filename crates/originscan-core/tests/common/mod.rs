#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use url::Url;
use uuid::Uuid;

use originscan_api::provider_types::{DnsRecordResponse, ZoneResponse};
use originscan_core::{
    Connector, CoreError, DnsProvider, DnsRecord, ExposureStatus, MemoryStore, OrgId, ProbeResult,
    Prober, RecordSync, ScanConfig, ScanLog, ScanStatus, ScanStore, Zone,
};

// ── Provider ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeProvider {
    pub zones: Vec<ZoneResponse>,
    pub records: HashMap<String, Vec<DnsRecordResponse>>,
    pub fail_zone_listing: bool,
    pub credential_valid: bool,
}

impl FakeProvider {
    pub fn with_zone(mut self, id: &str, name: &str, records: Vec<DnsRecordResponse>) -> Self {
        self.zones.push(ZoneResponse {
            id: id.into(),
            name: name.into(),
            status: "active".into(),
            name_servers: vec!["ns1.example.net".into()],
            paused: false,
        });
        self.records.insert(id.into(), records);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_zone_listing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl DnsProvider for FakeProvider {
    async fn list_zones(&self) -> Result<Vec<ZoneResponse>, CoreError> {
        if self.fail_zone_listing {
            return Err(CoreError::Provider {
                message: "zone listing exploded".into(),
                code: Some(10000),
                status: Some(500),
            });
        }
        Ok(self.zones.clone())
    }

    async fn list_filtered_records(&self, zone_id: &str) -> Vec<DnsRecordResponse> {
        self.records.get(zone_id).cloned().unwrap_or_default()
    }

    async fn verify_credential(&self) -> bool {
        self.credential_valid
    }
}

pub fn dns_record(id: &str, record_type: &str, name: &str, content: &str, proxied: bool) -> DnsRecordResponse {
    DnsRecordResponse {
        id: id.into(),
        zone_id: None,
        zone_name: None,
        name: name.into(),
        record_type: record_type.into(),
        content: content.into(),
        proxied,
        proxiable: true,
        ttl: Some(1),
    }
}

// ── Prober ───────────────────────────────────────────────────────────

/// Hostnames not listed resolve to connection refused.
#[derive(Default)]
pub struct FakeProber {
    pub answers: Mutex<HashMap<String, ProbeResult>>,
    pub answering_origins: HashSet<String>,
    pub panicking: HashSet<String>,
    pub probed: Mutex<Vec<String>>,
}

impl FakeProber {
    pub fn answer(&self, hostname: &str, status: ExposureStatus, http: Option<u16>) {
        self.answers.lock().unwrap().insert(
            hostname.into(),
            ProbeResult {
                status,
                http_status_code: http,
                response_time_ms: 25,
                error: None,
            },
        );
    }

    pub fn probe_count(&self) -> usize {
        self.probed.lock().unwrap().len()
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, hostname: &str) -> ProbeResult {
        self.probed.lock().unwrap().push(hostname.into());
        assert!(!self.panicking.contains(hostname), "probe crashed for {hostname}");
        self.answers
            .lock()
            .unwrap()
            .get(hostname)
            .cloned()
            .unwrap_or(ProbeResult {
                status: ExposureStatus::Unreachable,
                http_status_code: None,
                response_time_ms: 3,
                error: Some("connection_refused: tcp connect error".into()),
            })
    }

    async fn probe_origin(&self, _ip: IpAddr, hostname: &str) -> bool {
        self.answering_origins.contains(hostname)
    }
}

/// Answers every probe as public after `delay`, tracking how many probes
/// overlap.
pub struct SlowProber {
    pub delay: Duration,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl SlowProber {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for SlowProber {
    async fn probe(&self, _hostname: &str) -> ProbeResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        ProbeResult {
            status: ExposureStatus::Public,
            http_status_code: Some(200),
            response_time_ms: 20,
            error: None,
        }
    }

    async fn probe_origin(&self, _ip: IpAddr, _hostname: &str) -> bool {
        false
    }
}

// ── Connector ────────────────────────────────────────────────────────

pub struct FakeConnector {
    pub providers: HashMap<OrgId, Arc<dyn DnsProvider>>,
    pub prober: Arc<dyn Prober>,
    pub proxies_seen: Mutex<Vec<Option<Url>>>,
}

impl FakeConnector {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            providers: HashMap::new(),
            prober,
            proxies_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_provider(mut self, org: &str, provider: impl DnsProvider + 'static) -> Self {
        self.providers.insert(OrgId::from(org), Arc::new(provider));
        self
    }
}

impl Connector for FakeConnector {
    fn provider(&self, config: &ScanConfig) -> Result<Arc<dyn DnsProvider>, CoreError> {
        if config.api_token.is_none() {
            return Err(CoreError::Config {
                message: "no credential".into(),
            });
        }
        let provider = self
            .providers
            .get(&config.org_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(FakeProvider::failing()) as Arc<dyn DnsProvider>);
        Ok(provider)
    }

    /// Only the token "good-token" verifies.
    fn provider_for_token(&self, token: &SecretString) -> Result<Arc<dyn DnsProvider>, CoreError> {
        Ok(Arc::new(FakeProvider {
            credential_valid: token.expose_secret() == "good-token",
            ..FakeProvider::default()
        }))
    }

    fn prober(&self, proxy: Option<&Url>) -> Result<Arc<dyn Prober>, CoreError> {
        self.proxies_seen.lock().unwrap().push(proxy.cloned());
        Ok(self.prober.clone())
    }
}

// ── Store wrapper ────────────────────────────────────────────────────

/// Delegates to a `MemoryStore`, failing chosen writes and recording
/// every scan-log write.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_record_saves: bool,
    /// `update_scan_log` refuses logs in these states.
    pub rejected_statuses: Vec<ScanStatus>,
    pub log_writes: Mutex<Vec<ScanLog>>,
}

impl FlakyStore {
    pub fn failing_record_saves() -> Self {
        Self {
            fail_record_saves: true,
            ..Self::default()
        }
    }

    pub fn rejecting(statuses: &[ScanStatus]) -> Self {
        Self {
            rejected_statuses: statuses.to_vec(),
            ..Self::default()
        }
    }

    pub fn log_writes(&self) -> Vec<ScanLog> {
        self.log_writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanStore for FlakyStore {
    async fn scan_config(&self, org: &OrgId) -> Result<Option<ScanConfig>, CoreError> {
        self.inner.scan_config(org).await
    }
    async fn save_scan_config(&self, config: ScanConfig) -> Result<(), CoreError> {
        self.inner.save_scan_config(config).await
    }
    async fn remove_organization(&self, org: &OrgId) -> Result<bool, CoreError> {
        self.inner.remove_organization(org).await
    }
    async fn scan_configs(&self) -> Result<Vec<ScanConfig>, CoreError> {
        self.inner.scan_configs().await
    }
    async fn upsert_zone(&self, zone: Zone) -> Result<bool, CoreError> {
        self.inner.upsert_zone(zone).await
    }
    async fn zones(&self, org: &OrgId) -> Result<Vec<Zone>, CoreError> {
        self.inner.zones(org).await
    }
    async fn upsert_record(
        &self,
        sync: RecordSync,
        now: DateTime<Utc>,
    ) -> Result<DnsRecord, CoreError> {
        self.inner.upsert_record(sync, now).await
    }
    async fn record(
        &self,
        org: &OrgId,
        provider_id: &str,
    ) -> Result<Option<DnsRecord>, CoreError> {
        self.inner.record(org, provider_id).await
    }
    async fn records(&self, org: &OrgId) -> Result<Vec<DnsRecord>, CoreError> {
        self.inner.records(org).await
    }
    async fn save_record(&self, record: DnsRecord) -> Result<(), CoreError> {
        if self.fail_record_saves {
            return Err(CoreError::Store {
                message: "disk full".into(),
            });
        }
        self.inner.save_record(record).await
    }
    async fn create_scan_log(&self, log: ScanLog) -> Result<(), CoreError> {
        self.inner.create_scan_log(log).await
    }
    async fn update_scan_log(&self, log: &ScanLog) -> Result<(), CoreError> {
        if self.rejected_statuses.contains(&log.status) {
            return Err(CoreError::Store {
                message: format!("cannot write a {} scan log", log.status),
            });
        }
        self.log_writes.lock().unwrap().push(log.clone());
        self.inner.update_scan_log(log).await
    }
    async fn scan_log(&self, id: Uuid) -> Result<Option<ScanLog>, CoreError> {
        self.inner.scan_log(id).await
    }
    async fn scan_logs(&self, org: &OrgId) -> Result<Vec<ScanLog>, CoreError> {
        self.inner.scan_logs(org).await
    }
    async fn running_scan(&self, org: &OrgId) -> Result<Option<ScanLog>, CoreError> {
        self.inner.running_scan(org).await
    }
    async fn release_scan(&self, org: &OrgId, scan_id: Uuid) -> Result<(), CoreError> {
        self.inner.release_scan(org, scan_id).await
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

pub fn org_config(org: &str) -> ScanConfig {
    ScanConfig::new(OrgId::from(org)).with_token(SecretString::from("good-token"))
}

/// The canonical leak fixture: one IP behind the CDN and published directly.
pub fn leak_zone_records() -> Vec<DnsRecordResponse> {
    vec![
        dns_record("rec-a", "A", "a.example.com", "1.2.3.4", true),
        dns_record("rec-b", "A", "b.example.com", "1.2.3.4", false),
        dns_record("rec-c", "A", "c.example.com", "5.6.7.8", true),
        dns_record("rec-d", "CNAME", "www.example.com", "a.example.com", true),
    ]
}
