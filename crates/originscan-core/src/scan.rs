// ── Scan orchestration ──
//
// Drives one organization's scan through sync, reachability and origin
// correlation. Progress is written to the store after every zone, every
// probe batch and the correlation pass, and broadcast on a `watch`
// channel for live display.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{ScanConfig, ScanConfigUpdate};
use crate::connector::Connector;
use crate::convert::{record_sync_from_provider, zone_from_provider};
use crate::correlate::correlate;
use crate::error::CoreError;
use crate::model::{DnsRecord, ExposureStatus, OrgId, RecordType, ScanLog, ScanTrigger, Zone};
use crate::probe::{ProbeResult, Prober};
use crate::provider::DnsProvider;
use crate::store::ScanStore;

/// Records probed concurrently per reachability batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

// ── Record filter ────────────────────────────────────────────────────

/// Criteria for [`ScanService::records`].
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub status: Option<ExposureStatus>,
    pub record_type: Option<RecordType>,
    /// Only records whose origin is exposed.
    pub exposed_only: bool,
}

impl RecordFilter {
    pub fn matches(&self, record: &DnsRecord) -> bool {
        self.status.is_none_or(|s| record.exposure_status == s)
            && self.record_type.is_none_or(|t| record.record_type == t)
            && (!self.exposed_only || record.is_origin_exposed())
    }
}

// ── Service ──────────────────────────────────────────────────────────

/// Entry point for scans and scan data.
///
/// Cheaply cloneable via `Arc<ScanServiceInner>`.
#[derive(Clone)]
pub struct ScanService {
    inner: Arc<ScanServiceInner>,
}

struct ScanServiceInner {
    store: Arc<dyn ScanStore>,
    connector: Arc<dyn Connector>,
    progress: watch::Sender<Option<ScanLog>>,
    batch_size: usize,
}

impl ScanService {
    pub fn new(store: Arc<dyn ScanStore>, connector: Arc<dyn Connector>) -> Self {
        Self::with_batch_size(store, connector, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(
        store: Arc<dyn ScanStore>,
        connector: Arc<dyn Connector>,
        batch_size: usize,
    ) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            inner: Arc::new(ScanServiceInner {
                store,
                connector,
                progress,
                batch_size: batch_size.max(1),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn ScanStore> {
        &self.inner.store
    }

    /// Every scan-log write, as it happens.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<ScanLog>> {
        self.inner.progress.subscribe()
    }

    // ── Scans ────────────────────────────────────────────────────────

    /// Run a full scan unless one is already running for `org`.
    pub async fn start_scan(&self, org: &OrgId, trigger: ScanTrigger) -> Result<ScanLog, CoreError> {
        if let Some(running) = self.inner.store.running_scan(org).await? {
            return Err(CoreError::ScanInProgress {
                org: org.clone(),
                scan_id: running.id,
            });
        }
        self.run_full_scan(org, trigger).await
    }

    /// Sync, probe and correlate every record of `org`.
    ///
    /// Returns the finished log. On failure the log is finalized as
    /// failed, keeping its counters, and the error is returned. A store
    /// error while finalizing also fails the scan.
    pub async fn run_full_scan(
        &self,
        org: &OrgId,
        trigger: ScanTrigger,
    ) -> Result<ScanLog, CoreError> {
        let config = self.require_config(org).await?;
        let connector = &self.inner.connector;
        let provider = connector.provider(&config)?;
        let prober = connector.prober(config.proxy_url.as_ref())?;

        let mut log = ScanLog::start(org.clone(), trigger);
        self.inner.store.create_scan_log(log.clone()).await?;
        self.publish(&log);
        info!(org = %org, scan_id = %log.id, trigger = %log.triggered_by, "scan started");

        match self.execute(&mut log, provider.as_ref(), &prober).await {
            Ok(()) => {
                log.complete();
                if let Err(store_err) = self.checkpoint(&log).await {
                    warn!(
                        org = %org,
                        scan_id = %log.id,
                        error = %store_err,
                        "could not record scan completion"
                    );
                    log.fail(store_err.to_string());
                    self.record_failure(&log).await;
                    return Err(store_err);
                }
                info!(
                    org = %org,
                    scan_id = %log.id,
                    zones = log.counters.zones_scanned,
                    records = log.counters.records_scanned,
                    exposed = log.counters.origin_exposed,
                    "scan completed"
                );
                Ok(log)
            }
            Err(e) => {
                warn!(org = %org, scan_id = %log.id, error = %e, "scan failed");
                log.fail(e.to_string());
                self.record_failure(&log).await;
                Err(e)
            }
        }
    }

    /// Write a failed log. If that write fails too, the active-scan
    /// marker is released directly so the organization is not blocked.
    async fn record_failure(&self, log: &ScanLog) {
        let Err(store_err) = self.checkpoint(log).await else {
            return;
        };
        warn!(scan_id = %log.id, error = %store_err, "could not record scan failure");
        if let Err(e) = self.inner.store.release_scan(&log.org_id, log.id).await {
            warn!(scan_id = %log.id, error = %e, "could not release active scan");
        }
        self.publish(log);
    }

    async fn execute(
        &self,
        log: &mut ScanLog,
        provider: &dyn DnsProvider,
        prober: &Arc<dyn Prober>,
    ) -> Result<(), CoreError> {
        self.sync(log, provider).await?;
        self.check_reachability(log, prober).await?;
        self.correlate_origins(log, prober.as_ref()).await
    }

    /// Phase 1: mirror zones and A/AAAA/CNAME records.
    async fn sync(&self, log: &mut ScanLog, provider: &dyn DnsProvider) -> Result<(), CoreError> {
        let store = &self.inner.store;
        let zones = provider.list_zones().await?;
        debug!(org = %log.org_id, count = zones.len(), "zones listed");

        for response in zones {
            let zone = zone_from_provider(&log.org_id, response, Utc::now());
            let zone_id = zone.provider_id.clone();
            log.current_domain = Some(zone.name.clone());
            store.upsert_zone(zone).await?;

            for response in provider.list_filtered_records(&zone_id).await {
                let Some(sync) = record_sync_from_provider(&log.org_id, &zone_id, response) else {
                    continue;
                };
                store.upsert_record(sync, Utc::now()).await?;
                log.counters.records_scanned += 1;
            }

            log.counters.zones_scanned += 1;
            self.checkpoint(log).await?;
        }
        Ok(())
    }

    /// Phase 2: probe every record in concurrent batches.
    async fn check_reachability(
        &self,
        log: &mut ScanLog,
        prober: &Arc<dyn Prober>,
    ) -> Result<(), CoreError> {
        let store = &self.inner.store;
        let records = store.records(&log.org_id).await?;
        log.counters.records_total = records.len();

        for batch in records.chunks(self.inner.batch_size) {
            let handles = batch.iter().map(|record| {
                let prober = Arc::clone(prober);
                let hostname = record.hostname.clone();
                tokio::spawn(async move { prober.probe(&hostname).await })
            });
            let outcomes = join_all(handles).await;

            for (record, outcome) in batch.iter().zip(outcomes) {
                let result = outcome.unwrap_or_else(|e| {
                    warn!(hostname = %record.hostname, error = %e, "probe task failed");
                    ProbeResult::task_failed(&e)
                });
                let mut record = record.clone();
                record.apply_probe(&result, Utc::now());
                log.counters.record_check(result.status);
                store.save_record(record).await?;
            }

            log.current_domain = batch.last().map(|r| r.hostname.clone());
            self.checkpoint(log).await?;
        }
        Ok(())
    }

    /// Phase 3: one correlation pass over the full record set.
    async fn correlate_origins(&self, log: &mut ScanLog, prober: &dyn Prober) -> Result<(), CoreError> {
        let store = &self.inner.store;
        let records = store.records(&log.org_id).await?;
        let correlation = correlate(records, prober).await;

        for record in correlation.records {
            store.save_record(record).await?;
        }
        log.counters.origin_exposed = correlation.exposed;
        log.current_domain = None;
        self.checkpoint(log).await
    }

    /// Re-probe one record and persist its reachability fields.
    pub async fn check_single_record(
        &self,
        record_id: &str,
        org: &OrgId,
    ) -> Result<DnsRecord, CoreError> {
        let store = &self.inner.store;
        let mut record = store
            .record(org, record_id)
            .await?
            .ok_or_else(|| CoreError::not_found("DNS record", record_id))?;
        let proxy = store.scan_config(org).await?.and_then(|c| c.proxy_url);
        let prober = self.inner.connector.prober(proxy.as_ref())?;

        let result = prober.probe(&record.hostname).await;
        debug!(hostname = %record.hostname, status = %result.status, "record re-checked");
        record.apply_probe(&result, Utc::now());
        store.save_record(record.clone()).await?;
        Ok(record)
    }

    async fn checkpoint(&self, log: &ScanLog) -> Result<(), CoreError> {
        self.inner.store.update_scan_log(log).await?;
        self.publish(log);
        Ok(())
    }

    fn publish(&self, log: &ScanLog) {
        self.inner.progress.send_replace(Some(log.clone()));
    }

    // ── Organization admin ───────────────────────────────────────────

    /// Create or update an organization's configuration.
    ///
    /// A new credential is verified against the provider first; a
    /// rejected one leaves the stored configuration untouched.
    pub async fn configure(
        &self,
        org: &OrgId,
        update: ScanConfigUpdate,
    ) -> Result<ScanConfig, CoreError> {
        let store = &self.inner.store;
        let mut config = store
            .scan_config(org)
            .await?
            .unwrap_or_else(|| ScanConfig::new(org.clone()));

        if let Some(token) = &update.api_token {
            let provider = self.inner.connector.provider_for_token(token)?;
            if !provider.verify_credential().await {
                return Err(CoreError::InvalidCredential { org: org.clone() });
            }
        }

        config.apply(update);
        if !config.has_credential() {
            return Err(CoreError::config(format!(
                "organization '{org}' needs an API credential"
            )));
        }

        store.save_scan_config(config.clone()).await?;
        info!(org = %org, enabled = config.enabled, "organization configured");
        Ok(config)
    }

    /// Check the stored credential of `org` against the provider.
    pub async fn verify_organization(&self, org: &OrgId) -> Result<bool, CoreError> {
        let config = self.require_config(org).await?;
        let provider = self.inner.connector.provider(&config)?;
        Ok(provider.verify_credential().await)
    }

    pub async fn remove_organization(&self, org: &OrgId) -> Result<(), CoreError> {
        if self.inner.store.remove_organization(org).await? {
            info!(org = %org, "organization removed");
            Ok(())
        } else {
            Err(CoreError::not_found("organization", org.as_str()))
        }
    }

    pub async fn organizations(&self) -> Result<Vec<ScanConfig>, CoreError> {
        self.inner.store.scan_configs().await
    }

    async fn require_config(&self, org: &OrgId) -> Result<ScanConfig, CoreError> {
        let config = self
            .inner
            .store
            .scan_config(org)
            .await?
            .ok_or_else(|| CoreError::not_found("organization", org.as_str()))?;
        if !config.has_credential() {
            return Err(CoreError::config(format!(
                "organization '{org}' has no API credential configured"
            )));
        }
        Ok(config)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn zones(&self, org: &OrgId) -> Result<Vec<Zone>, CoreError> {
        self.inner.store.zones(org).await
    }

    pub async fn records(
        &self,
        org: &OrgId,
        filter: &RecordFilter,
    ) -> Result<Vec<DnsRecord>, CoreError> {
        let mut records = match filter.status {
            Some(status) => self.inner.store.records_with_status(org, status).await?,
            None => self.inner.store.records(org).await?,
        };
        records.retain(|r| filter.matches(r));
        Ok(records)
    }

    pub async fn record(&self, org: &OrgId, record_id: &str) -> Result<DnsRecord, CoreError> {
        self.inner
            .store
            .record(org, record_id)
            .await?
            .ok_or_else(|| CoreError::not_found("DNS record", record_id))
    }

    pub async fn scan_logs(&self, org: &OrgId) -> Result<Vec<ScanLog>, CoreError> {
        self.inner.store.scan_logs(org).await
    }

    pub async fn latest_scan_log(&self, org: &OrgId) -> Result<Option<ScanLog>, CoreError> {
        Ok(self.inner.store.scan_logs(org).await?.into_iter().next())
    }

    pub async fn scan_log(&self, id: uuid::Uuid) -> Result<ScanLog, CoreError> {
        self.inner
            .store
            .scan_log(id)
            .await?
            .ok_or_else(|| CoreError::not_found("scan", id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{OriginExposureType, RecordSync};

    fn record(status: ExposureStatus, record_type: RecordType, exposed: bool) -> DnsRecord {
        let mut record = DnsRecord::from_sync(
            RecordSync {
                org_id: OrgId::from("acme"),
                provider_id: "r".into(),
                zone_id: "z".into(),
                hostname: "h.example.com".into(),
                record_type,
                content: "1.2.3.4".into(),
                proxied: true,
            },
            Utc::now(),
        );
        record.exposure_status = status;
        if exposed {
            record.mark_origin_exposed(OriginExposureType::IpLeak, "leak".into());
        }
        record
    }

    #[test]
    fn default_filter_matches_everything() {
        let filter = RecordFilter::default();
        assert!(filter.matches(&record(ExposureStatus::Pending, RecordType::Cname, false)));
    }

    #[test]
    fn filter_combines_criteria() {
        let filter = RecordFilter {
            status: Some(ExposureStatus::Public),
            record_type: Some(RecordType::A),
            exposed_only: true,
        };
        assert!(filter.matches(&record(ExposureStatus::Public, RecordType::A, true)));
        assert!(!filter.matches(&record(ExposureStatus::Public, RecordType::A, false)));
        assert!(!filter.matches(&record(ExposureStatus::Private, RecordType::A, true)));
        assert!(!filter.matches(&record(ExposureStatus::Public, RecordType::Aaaa, true)));
    }
}
