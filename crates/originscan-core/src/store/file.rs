// ── Shared snapshot store ──
//
// A `MemoryStore` bound to a snapshot file that several processes share.
// A running scan holds a lease file under `<snapshot>.leases/`, created
// exclusively and rewritten at every checkpoint. Other processes treat a
// fresh lease as an active scan. Scan-log writes flush the snapshot by
// merging with the file on disk, so one process never erases another's
// scans.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::snapshot::{Snapshot, tmp_path, write_replacing};
use super::{MemoryStore, ScanStore};
use crate::config::ScanConfig;
use crate::error::CoreError;
use crate::model::{DnsRecord, OrgId, RecordSync, ScanLog, Zone};

/// How long a lease lives without a checkpoint before other processes
/// consider its scan dead.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(600);

const INTERRUPTED: &str = "interrupted: the process exited before the scan finished";

/// A lease file: the latest checkpoint of the scan holding it.
#[derive(Debug, Serialize, Deserialize)]
struct Lease {
    log: ScanLog,
    pid: u32,
    heartbeat_at: DateTime<Utc>,
}

/// Snapshot-backed store shared between CLI invocations.
pub struct FileStore {
    memory: MemoryStore,
    path: PathBuf,
    lease_dir: PathBuf,
    lease_ttl: Duration,
    /// Organizations whose zones and records this process has written.
    touched: DashSet<OrgId>,
    removed: DashSet<OrgId>,
    /// Scan logs created by this process.
    own_logs: DashSet<Uuid>,
    flush_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        Self::open_with_lease_ttl(path, DEFAULT_LEASE_TTL)
    }

    /// Load the snapshot at `path`, or start empty when it does not exist.
    ///
    /// A running log without a fresh lease belongs to a process that died
    /// mid-scan; it is failed so it cannot block new scans. A running log
    /// whose lease is still fresh stays running.
    pub fn open_with_lease_ttl(path: &Path, lease_ttl: Duration) -> Result<Self, CoreError> {
        let store = Self {
            memory: MemoryStore::new(),
            path: path.to_path_buf(),
            lease_dir: lease_dir(path),
            lease_ttl,
            touched: DashSet::new(),
            removed: DashSet::new(),
            own_logs: DashSet::new(),
            flush_lock: Mutex::new(()),
        };

        let snapshot = Snapshot::read(path)?;
        for zone in snapshot.zones {
            store
                .memory
                .zones
                .insert((zone.org_id.clone(), zone.provider_id.clone()), zone);
        }
        for record in snapshot.records {
            store
                .memory
                .records
                .insert((record.org_id.clone(), record.provider_id.clone()), record);
        }
        for mut log in snapshot.scan_logs {
            if log.is_running() && !store.lease_is_live(&log) {
                warn!(scan_id = %log.id, org = %log.org_id, "marking interrupted scan as failed");
                log.fail(INTERRUPTED);
            }
            store.memory.scan_logs.insert(log.id, log);
        }
        Ok(store)
    }

    pub fn record_count(&self) -> usize {
        self.memory.record_count()
    }

    /// Merge this process's writes into the snapshot file.
    ///
    /// Zones and records of organizations this process wrote keep the
    /// newer of the two copies; other organizations keep the disk copy.
    /// Scan logs created here replace their disk copy; all others come
    /// from disk.
    pub fn flush(&self) -> Result<(), CoreError> {
        let _guard = self
            .flush_lock
            .lock()
            .map_err(|_| CoreError::store("snapshot lock poisoned"))?;
        let disk = Snapshot::read(&self.path)?;
        self.merge(disk).write(&self.path)
    }

    fn merge(&self, disk: Snapshot) -> Snapshot {
        let keep = |org: &OrgId| !self.removed.contains(org);
        let ours = |org: &OrgId| self.touched.contains(org);

        let mut zones: BTreeMap<_, Zone> = disk
            .zones
            .into_iter()
            .filter(|z| keep(&z.org_id))
            .map(|z| ((z.org_id.clone(), z.provider_id.clone()), z))
            .collect();
        for zone in self.memory.zones.iter().filter(|z| ours(&z.org_id)) {
            let newer = zones
                .get(zone.key())
                .is_none_or(|disk| disk.last_synced_at <= zone.last_synced_at);
            if newer {
                zones.insert(zone.key().clone(), zone.value().clone());
            }
        }

        let mut records: BTreeMap<_, DnsRecord> = disk
            .records
            .into_iter()
            .filter(|r| keep(&r.org_id))
            .map(|r| ((r.org_id.clone(), r.provider_id.clone()), r))
            .collect();
        for record in self.memory.records.iter().filter(|r| ours(&r.org_id)) {
            let newer = records
                .get(record.key())
                .is_none_or(|disk| last_touched(disk) <= last_touched(record.value()));
            if newer {
                records.insert(record.key().clone(), record.value().clone());
            }
        }

        let mut scan_logs: BTreeMap<Uuid, ScanLog> = disk
            .scan_logs
            .into_iter()
            .filter(|l| keep(&l.org_id) && !self.own_logs.contains(&l.id))
            .map(|l| (l.id, l))
            .collect();
        for log in self.memory.scan_logs.iter() {
            if self.own_logs.contains(&log.id) {
                scan_logs.insert(log.id, log.clone());
            }
        }

        Snapshot {
            zones: zones.into_values().collect(),
            records: records.into_values().collect(),
            scan_logs: scan_logs.into_values().collect(),
        }
    }

    fn touch(&self, org: &OrgId) {
        if !self.touched.contains(org) {
            self.touched.insert(org.clone());
        }
    }

    /// Undo a scan log that could not be claimed or written.
    async fn abandon(&self, org: &OrgId, scan_id: Uuid) {
        if let Err(e) = self.drop_lease(org, scan_id) {
            warn!(org = %org, %scan_id, error = %e, "could not remove lease");
        }
        if let Err(e) = self.memory.release_scan(org, scan_id).await {
            warn!(org = %org, %scan_id, error = %e, "could not release active scan");
        }
        self.memory.scan_logs.remove(&scan_id);
        self.own_logs.remove(&scan_id);
    }

    // ── Leases ───────────────────────────────────────────────────────

    fn lease_path(&self, org: &OrgId) -> PathBuf {
        let name: String = org
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.lease_dir.join(format!("{name}.json"))
    }

    fn read_lease(&self, org: &OrgId) -> Option<Lease> {
        let path = self.lease_path(org);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Lease>(&raw) {
            Ok(lease) if lease.log.org_id == *org => Some(lease),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable lease");
                None
            }
        }
    }

    fn is_fresh(&self, lease: &Lease) -> bool {
        match (Utc::now() - lease.heartbeat_at).to_std() {
            Ok(age) => age < self.lease_ttl,
            // Heartbeat in the future: clock skew between processes.
            Err(_) => true,
        }
    }

    /// The fresh lease on `org`, whoever holds it.
    fn live_lease(&self, org: &OrgId) -> Option<Lease> {
        self.read_lease(org).filter(|lease| self.is_fresh(lease))
    }

    fn lease_is_live(&self, log: &ScanLog) -> bool {
        self.live_lease(&log.org_id)
            .is_some_and(|lease| lease.log.id == log.id)
    }

    /// Take the lease for a new running scan.
    ///
    /// A fresh lease held by another scan is a
    /// [`CoreError::ScanInProgress`]; a stale one is taken over.
    fn claim_lease(&self, log: &ScanLog) -> Result<(), CoreError> {
        fs::create_dir_all(&self.lease_dir).map_err(|e| {
            CoreError::store(format!("cannot create {}: {e}", self.lease_dir.display()))
        })?;
        let path = self.lease_path(&log.org_id);
        let tmp = tmp_path(&path);
        fs::write(&tmp, encode_lease(log)?)
            .map_err(|e| CoreError::store(format!("cannot write {}: {e}", tmp.display())))?;

        // A hard link fails if the lease exists, and never exposes a
        // half-written file.
        let claimed = self.link_lease(&tmp, &path, log);
        if let Err(e) = fs::remove_file(&tmp) {
            debug!(path = %tmp.display(), error = %e, "could not remove scratch lease");
        }
        claimed
    }

    fn link_lease(&self, tmp: &Path, path: &Path, log: &ScanLog) -> Result<(), CoreError> {
        for _ in 0..2 {
            match fs::hard_link(tmp, path) {
                Ok(()) => {
                    debug!(org = %log.org_id, scan_id = %log.id, "lease claimed");
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(held) = self.live_lease(&log.org_id) {
                        debug!(org = %log.org_id, pid = held.pid, "lease held elsewhere");
                        return Err(CoreError::ScanInProgress {
                            org: log.org_id.clone(),
                            scan_id: held.log.id,
                        });
                    }
                    warn!(org = %log.org_id, "taking over a stale lease");
                    remove_if_present(path)?;
                }
                Err(e) => {
                    return Err(CoreError::store(format!(
                        "cannot create lease {}: {e}",
                        path.display()
                    )));
                }
            }
        }
        Err(CoreError::store(format!("could not claim lease {}", path.display())))
    }

    /// Rewrite our lease with the latest checkpoint, or drop it once the
    /// scan has finished.
    fn sync_lease(&self, log: &ScanLog) -> Result<(), CoreError> {
        if !log.is_running() {
            return self.drop_lease(&log.org_id, log.id);
        }
        if self.read_lease(&log.org_id).is_some_and(|lease| lease.log.id == log.id) {
            write_replacing(&self.lease_path(&log.org_id), &encode_lease(log)?)
        } else {
            warn!(org = %log.org_id, scan_id = %log.id, "lease was taken over by another process");
            Ok(())
        }
    }

    fn drop_lease(&self, org: &OrgId, scan_id: Uuid) -> Result<(), CoreError> {
        if self.read_lease(org).is_some_and(|lease| lease.log.id == scan_id) {
            remove_if_present(&self.lease_path(org))?;
            debug!(org = %org, %scan_id, "lease released");
        }
        Ok(())
    }
}

#[async_trait]
impl ScanStore for FileStore {
    async fn scan_config(&self, org: &OrgId) -> Result<Option<ScanConfig>, CoreError> {
        self.memory.scan_config(org).await
    }

    async fn save_scan_config(&self, config: ScanConfig) -> Result<(), CoreError> {
        self.memory.save_scan_config(config).await
    }

    async fn remove_organization(&self, org: &OrgId) -> Result<bool, CoreError> {
        let existed = self.memory.remove_organization(org).await?;
        self.touched.remove(org);
        self.removed.insert(org.clone());
        Ok(existed)
    }

    async fn scan_configs(&self) -> Result<Vec<ScanConfig>, CoreError> {
        self.memory.scan_configs().await
    }

    async fn upsert_zone(&self, zone: Zone) -> Result<bool, CoreError> {
        self.touch(&zone.org_id);
        self.memory.upsert_zone(zone).await
    }

    async fn zones(&self, org: &OrgId) -> Result<Vec<Zone>, CoreError> {
        self.memory.zones(org).await
    }

    async fn upsert_record(
        &self,
        sync: RecordSync,
        now: DateTime<Utc>,
    ) -> Result<DnsRecord, CoreError> {
        self.touch(&sync.org_id);
        self.memory.upsert_record(sync, now).await
    }

    async fn record(
        &self,
        org: &OrgId,
        provider_id: &str,
    ) -> Result<Option<DnsRecord>, CoreError> {
        self.memory.record(org, provider_id).await
    }

    async fn records(&self, org: &OrgId) -> Result<Vec<DnsRecord>, CoreError> {
        self.memory.records(org).await
    }

    async fn save_record(&self, record: DnsRecord) -> Result<(), CoreError> {
        self.touch(&record.org_id);
        self.memory.save_record(record).await
    }

    /// Claims the in-process marker, then the lease, then writes the
    /// snapshot so other processes see the running scan.
    async fn create_scan_log(&self, log: ScanLog) -> Result<(), CoreError> {
        let (org, scan_id) = (log.org_id.clone(), log.id);
        let lease = log.is_running().then(|| log.clone());
        self.memory.create_scan_log(log).await?;
        self.own_logs.insert(scan_id);

        if let Some(log) = lease {
            if let Err(e) = self.claim_lease(&log) {
                self.abandon(&org, scan_id).await;
                return Err(e);
            }
        }
        if let Err(e) = self.flush() {
            self.abandon(&org, scan_id).await;
            return Err(e);
        }
        Ok(())
    }

    async fn update_scan_log(&self, log: &ScanLog) -> Result<(), CoreError> {
        self.memory.update_scan_log(log).await?;
        self.sync_lease(log)?;
        self.flush()
    }

    async fn scan_log(&self, id: Uuid) -> Result<Option<ScanLog>, CoreError> {
        self.memory.scan_log(id).await
    }

    async fn scan_logs(&self, org: &OrgId) -> Result<Vec<ScanLog>, CoreError> {
        self.memory.scan_logs(org).await
    }

    /// A scan of this process, or one another process holds a fresh
    /// lease for.
    async fn running_scan(&self, org: &OrgId) -> Result<Option<ScanLog>, CoreError> {
        if let Some(log) = self.memory.running_scan(org).await? {
            return Ok(Some(log));
        }
        Ok(self.live_lease(org).map(|lease| lease.log))
    }

    async fn release_scan(&self, org: &OrgId, scan_id: Uuid) -> Result<(), CoreError> {
        self.memory.release_scan(org, scan_id).await?;
        self.drop_lease(org, scan_id)
    }
}

fn lease_dir(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".leases");
    path.with_file_name(name)
}

fn encode_lease(log: &ScanLog) -> Result<String, CoreError> {
    let lease = Lease {
        log: log.clone(),
        pid: std::process::id(),
        heartbeat_at: Utc::now(),
    };
    serde_json::to_string_pretty(&lease)
        .map_err(|e| CoreError::store(format!("cannot encode lease: {e}")))
}

fn remove_if_present(path: &Path) -> Result<(), CoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::store(format!("cannot remove {}: {e}", path.display()))),
    }
}

fn last_touched(record: &DnsRecord) -> DateTime<Utc> {
    record
        .last_checked_at
        .map_or(record.synced_at, |checked| checked.max(record.synced_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordType, ScanStatus, ScanTrigger};

    fn sync(org: &str, id: &str) -> RecordSync {
        RecordSync {
            org_id: OrgId::from(org),
            provider_id: id.into(),
            zone_id: "z1".into(),
            hostname: format!("{id}.example.com"),
            record_type: RecordType::A,
            content: "1.2.3.4".into(),
            proxied: true,
        }
    }

    fn state_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("state").join("originscan.json")
    }

    #[tokio::test]
    async fn running_scan_is_visible_to_a_second_process() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = state_path(&dir);
        let org = OrgId::from("acme");

        let daemon = FileStore::open(&path).expect("open");
        let running = ScanLog::start(org.clone(), ScanTrigger::Scheduled);
        daemon.create_scan_log(running.clone()).await.expect("create");

        let manual = FileStore::open(&path).expect("open second");
        let seen = manual.running_scan(&org).await.expect("read").expect("running");
        assert_eq!(seen.id, running.id);
        assert!(manual.scan_log(running.id).await.expect("read").expect("present").is_running());

        let second = ScanLog::start(org.clone(), ScanTrigger::User("u1".into()));
        let err = manual.create_scan_log(second.clone()).await.expect_err("conflict");
        assert!(matches!(err, CoreError::ScanInProgress { scan_id, .. } if scan_id == running.id));
        assert!(manual.scan_log(second.id).await.expect("read").is_none());

        let mut finished = running;
        finished.complete();
        daemon.update_scan_log(&finished).await.expect("finish");
        assert!(manual.running_scan(&org).await.expect("read").is_none());
        manual.create_scan_log(second).await.expect("free after finish");
    }

    #[tokio::test]
    async fn checkpoints_refresh_the_lease() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = state_path(&dir);
        let org = OrgId::from("acme");

        let store = FileStore::open(&path).expect("open");
        let mut log = ScanLog::start(org.clone(), ScanTrigger::Scheduled);
        store.create_scan_log(log.clone()).await.expect("create");
        log.current_domain = Some("a.example.com".into());
        log.counters.checked = 3;
        store.update_scan_log(&log).await.expect("checkpoint");

        let other = FileStore::open(&path).expect("open second");
        let seen = other.running_scan(&org).await.expect("read").expect("running");
        assert_eq!(seen.current_domain.as_deref(), Some("a.example.com"));
        assert_eq!(seen.counters.checked, 3);
    }

    #[tokio::test]
    async fn dead_owner_scan_is_failed_on_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = state_path(&dir);
        let org = OrgId::from("acme");

        let crashed = FileStore::open(&path).expect("open");
        crashed.upsert_record(sync("acme", "r1"), Utc::now()).await.expect("record");
        let running = ScanLog::start(org.clone(), ScanTrigger::Scheduled);
        crashed.create_scan_log(running.clone()).await.expect("create");
        drop(crashed);

        // A zero lifetime makes every lease stale.
        let restored = FileStore::open_with_lease_ttl(&path, Duration::ZERO).expect("open");
        assert_eq!(restored.record_count(), 1);
        assert!(restored.scan_configs().await.expect("configs").is_empty());
        assert!(restored.running_scan(&org).await.expect("read").is_none());
        let log = restored.scan_log(running.id).await.expect("read").expect("present");
        assert_eq!(log.status, ScanStatus::Failed);
        assert!(log.error_message.is_some_and(|m| m.contains("interrupted")));

        let next = ScanLog::start(org, ScanTrigger::Scheduled);
        restored.create_scan_log(next).await.expect("stale lease taken over");
    }

    #[tokio::test]
    async fn saves_from_two_processes_keep_both_scans() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = state_path(&dir);

        let first = FileStore::open(&path).expect("open");
        let second = FileStore::open(&path).expect("open second");

        first.upsert_record(sync("alpha", "a1"), Utc::now()).await.expect("record");
        let mut alpha = ScanLog::start(OrgId::from("alpha"), ScanTrigger::Scheduled);
        first.create_scan_log(alpha.clone()).await.expect("alpha");

        second.upsert_record(sync("bravo", "b1"), Utc::now()).await.expect("record");
        let mut bravo = ScanLog::start(OrgId::from("bravo"), ScanTrigger::Scheduled);
        second.create_scan_log(bravo.clone()).await.expect("bravo");

        alpha.complete();
        first.update_scan_log(&alpha).await.expect("finish alpha");
        bravo.complete();
        second.update_scan_log(&bravo).await.expect("finish bravo");

        let merged = FileStore::open(&path).expect("reopen");
        assert_eq!(merged.record_count(), 2);
        let alpha_log = merged.scan_log(alpha.id).await.expect("read").expect("alpha kept");
        assert_eq!(alpha_log.status, ScanStatus::Completed);
        assert!(merged.scan_log(bravo.id).await.expect("read").is_some());
    }

    #[tokio::test]
    async fn removed_organization_is_dropped_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = state_path(&dir);
        let org = OrgId::from("acme");

        let store = FileStore::open(&path).expect("open");
        store.upsert_record(sync("acme", "r1"), Utc::now()).await.expect("record");
        store.flush().expect("flush");

        let admin = FileStore::open(&path).expect("open second");
        admin.remove_organization(&org).await.expect("remove");
        admin.flush().expect("flush");

        assert_eq!(FileStore::open(&path).expect("reopen").record_count(), 0);
    }

    #[tokio::test]
    async fn release_drops_the_lease() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = state_path(&dir);
        let org = OrgId::from("acme");

        let store = FileStore::open(&path).expect("open");
        let log = ScanLog::start(org.clone(), ScanTrigger::Scheduled);
        store.create_scan_log(log.clone()).await.expect("create");
        store.release_scan(&org, log.id).await.expect("release");

        let other = FileStore::open(&path).expect("open second");
        assert!(other.running_scan(&org).await.expect("read").is_none());
    }
}
