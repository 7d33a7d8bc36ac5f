// ── In-memory store ──
//
// DashMap-backed `ScanStore`. Writes lock a single shard; the active-scan
// marker is claimed through the entry API so two callers cannot both
// start a scan for the same organization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;
use uuid::Uuid;

use super::ScanStore;
use crate::config::ScanConfig;
use crate::error::CoreError;
use crate::model::{DnsRecord, OrgId, RecordSync, ScanLog, Zone};

type EntityKey = (OrgId, String);

/// Process-local store. [`FileStore`](super::FileStore) shares one
/// across processes through a snapshot file.
#[derive(Default)]
pub struct MemoryStore {
    pub(super) configs: DashMap<OrgId, ScanConfig>,
    pub(super) zones: DashMap<EntityKey, Zone>,
    pub(super) records: DashMap<EntityKey, DnsRecord>,
    pub(super) scan_logs: DashMap<Uuid, ScanLog>,
    /// Organization -> id of its running scan.
    pub(super) active_scans: DashMap<OrgId, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn scan_config(&self, org: &OrgId) -> Result<Option<ScanConfig>, CoreError> {
        Ok(self.configs.get(org).map(|c| c.clone()))
    }

    async fn save_scan_config(&self, config: ScanConfig) -> Result<(), CoreError> {
        self.configs.insert(config.org_id.clone(), config);
        Ok(())
    }

    async fn remove_organization(&self, org: &OrgId) -> Result<bool, CoreError> {
        let existed = self.configs.remove(org).is_some();
        self.zones.retain(|(owner, _), _| owner != org);
        self.records.retain(|(owner, _), _| owner != org);
        self.scan_logs.retain(|_, log| &log.org_id != org);
        self.active_scans.remove(org);
        Ok(existed)
    }

    async fn scan_configs(&self) -> Result<Vec<ScanConfig>, CoreError> {
        let mut configs: Vec<ScanConfig> = self.configs.iter().map(|c| c.clone()).collect();
        configs.sort_by(|a, b| a.org_id.cmp(&b.org_id));
        Ok(configs)
    }

    async fn upsert_zone(&self, zone: Zone) -> Result<bool, CoreError> {
        let key = (zone.org_id.clone(), zone.provider_id.clone());
        Ok(self.zones.insert(key, zone).is_none())
    }

    async fn zones(&self, org: &OrgId) -> Result<Vec<Zone>, CoreError> {
        let mut zones: Vec<Zone> = self
            .zones
            .iter()
            .filter(|z| &z.org_id == org)
            .map(|z| z.clone())
            .collect();
        zones.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(zones)
    }

    async fn upsert_record(
        &self,
        sync: RecordSync,
        now: DateTime<Utc>,
    ) -> Result<DnsRecord, CoreError> {
        let key = (sync.org_id.clone(), sync.provider_id.clone());
        let record = match self.records.entry(key) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().apply_sync(sync, now);
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                debug!(id = %sync.provider_id, hostname = %sync.hostname, "new DNS record");
                slot.insert(DnsRecord::from_sync(sync, now)).clone()
            }
        };
        Ok(record)
    }

    async fn record(
        &self,
        org: &OrgId,
        provider_id: &str,
    ) -> Result<Option<DnsRecord>, CoreError> {
        let key = (org.clone(), provider_id.to_owned());
        Ok(self.records.get(&key).map(|r| r.clone()))
    }

    async fn records(&self, org: &OrgId) -> Result<Vec<DnsRecord>, CoreError> {
        let mut records: Vec<DnsRecord> = self
            .records
            .iter()
            .filter(|r| &r.org_id == org)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| {
            a.hostname
                .cmp(&b.hostname)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        Ok(records)
    }

    async fn save_record(&self, record: DnsRecord) -> Result<(), CoreError> {
        let key = (record.org_id.clone(), record.provider_id.clone());
        match self.records.get_mut(&key) {
            Some(mut slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(CoreError::not_found("DNS record", record.provider_id)),
        }
    }

    async fn create_scan_log(&self, log: ScanLog) -> Result<(), CoreError> {
        if log.is_running() {
            match self.active_scans.entry(log.org_id.clone()) {
                Entry::Occupied(active) => {
                    return Err(CoreError::ScanInProgress {
                        org: log.org_id,
                        scan_id: *active.get(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(log.id);
                }
            }
        }
        self.scan_logs.insert(log.id, log);
        Ok(())
    }

    async fn update_scan_log(&self, log: &ScanLog) -> Result<(), CoreError> {
        if !self.scan_logs.contains_key(&log.id) {
            return Err(CoreError::not_found("scan log", log.id.to_string()));
        }
        self.scan_logs.insert(log.id, log.clone());
        if !log.is_running() {
            self.active_scans.remove_if(&log.org_id, |_, id| *id == log.id);
        }
        Ok(())
    }

    async fn scan_log(&self, id: Uuid) -> Result<Option<ScanLog>, CoreError> {
        Ok(self.scan_logs.get(&id).map(|l| l.clone()))
    }

    async fn scan_logs(&self, org: &OrgId) -> Result<Vec<ScanLog>, CoreError> {
        let mut logs: Vec<ScanLog> = self
            .scan_logs
            .iter()
            .filter(|l| &l.org_id == org)
            .map(|l| l.clone())
            .collect();
        logs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(logs)
    }

    async fn running_scan(&self, org: &OrgId) -> Result<Option<ScanLog>, CoreError> {
        let Some(id) = self.active_scans.get(org).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.scan_logs.get(&id).map(|l| l.clone()))
    }

    async fn release_scan(&self, org: &OrgId, scan_id: Uuid) -> Result<(), CoreError> {
        if self.active_scans.remove_if(org, |_, id| *id == scan_id).is_some() {
            debug!(org = %org, %scan_id, "active scan released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExposureStatus, RecordType, ScanTrigger};
    use crate::probe::ProbeResult;

    fn sync(id: &str, content: &str) -> RecordSync {
        RecordSync {
            org_id: OrgId::from("acme"),
            provider_id: id.into(),
            zone_id: "zone-1".into(),
            hostname: format!("{id}.example.com"),
            record_type: RecordType::A,
            content: content.into(),
            proxied: false,
        }
    }

    #[tokio::test]
    async fn upsert_record_is_keyed_by_provider_id() {
        let store = MemoryStore::new();
        store.upsert_record(sync("r1", "1.1.1.1"), Utc::now()).await.expect("insert");

        let mut record = store
            .record(&OrgId::from("acme"), "r1")
            .await
            .expect("read")
            .expect("present");
        record.apply_probe(
            &ProbeResult {
                status: ExposureStatus::Public,
                http_status_code: Some(200),
                response_time_ms: 10,
                error: None,
            },
            Utc::now(),
        );
        store.save_record(record).await.expect("save");

        let updated = store.upsert_record(sync("r1", "2.2.2.2"), Utc::now()).await.expect("update");

        assert_eq!(store.record_count(), 1);
        assert_eq!(updated.content, "2.2.2.2");
        assert_eq!(updated.exposure_status, ExposureStatus::Public);
    }

    #[tokio::test]
    async fn saving_unknown_record_is_not_found() {
        let store = MemoryStore::new();
        let record = DnsRecord::from_sync(sync("ghost", "1.1.1.1"), Utc::now());
        let err = store.save_record(record).await.expect_err("unknown record");
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn second_running_log_is_a_conflict_until_the_first_finishes() {
        let store = MemoryStore::new();
        let org = OrgId::from("acme");

        let mut first = ScanLog::start(org.clone(), ScanTrigger::Scheduled);
        store.create_scan_log(first.clone()).await.expect("first");

        let second = ScanLog::start(org.clone(), ScanTrigger::User("u1".into()));
        let err = store.create_scan_log(second.clone()).await.expect_err("conflict");
        assert!(matches!(err, CoreError::ScanInProgress { scan_id, .. } if scan_id == first.id));

        first.complete();
        store.update_scan_log(&first).await.expect("finish");
        assert!(store.running_scan(&org).await.expect("read").is_none());
        store.create_scan_log(second).await.expect("second after release");
    }

    #[tokio::test]
    async fn release_only_drops_the_named_scan() {
        let store = MemoryStore::new();
        let org = OrgId::from("acme");
        let log = ScanLog::start(org.clone(), ScanTrigger::Scheduled);
        store.create_scan_log(log.clone()).await.expect("create");

        store.release_scan(&org, Uuid::new_v4()).await.expect("other id");
        assert!(store.running_scan(&org).await.expect("read").is_some());

        store.release_scan(&org, log.id).await.expect("release");
        assert!(store.running_scan(&org).await.expect("read").is_none());
        let kept = store.scan_log(log.id).await.expect("read").expect("present");
        assert!(kept.is_running());
    }

    #[tokio::test]
    async fn remove_organization_drops_its_data_only() {
        let store = MemoryStore::new();
        store.save_scan_config(ScanConfig::new(OrgId::from("acme"))).await.expect("save");
        store.upsert_record(sync("r1", "1.1.1.1"), Utc::now()).await.expect("insert");
        let mut other = sync("r2", "1.1.1.1");
        other.org_id = OrgId::from("globex");
        store.upsert_record(other, Utc::now()).await.expect("insert");

        assert!(store.remove_organization(&OrgId::from("acme")).await.expect("remove"));
        assert_eq!(store.record_count(), 1);
        assert!(!store.remove_organization(&OrgId::from("acme")).await.expect("remove"));
    }
}
