// ── Scan persistence ──
//
// The orchestrator reads and writes through `ScanStore`. Zones and
// records are upserted by natural key, scan logs by id. The store also
// holds the active-scan marker behind the one-running-scan rule.

mod file;
mod memory;
mod snapshot;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ScanConfig;
use crate::error::CoreError;
use crate::model::{DnsRecord, ExposureStatus, OrgId, RecordSync, ScanLog, Zone};

pub use file::{DEFAULT_LEASE_TTL, FileStore};
pub use memory::MemoryStore;

#[async_trait]
pub trait ScanStore: Send + Sync {
    // ── Organization configuration ───────────────────────────────────

    async fn scan_config(&self, org: &OrgId) -> Result<Option<ScanConfig>, CoreError>;

    async fn save_scan_config(&self, config: ScanConfig) -> Result<(), CoreError>;

    /// Drop the configuration and every zone, record and log of `org`.
    /// Returns whether a configuration existed.
    async fn remove_organization(&self, org: &OrgId) -> Result<bool, CoreError>;

    /// All configurations, ordered by organization id.
    async fn scan_configs(&self) -> Result<Vec<ScanConfig>, CoreError>;

    async fn enabled_scan_configs(&self) -> Result<Vec<ScanConfig>, CoreError> {
        let mut configs = self.scan_configs().await?;
        configs.retain(|c| c.enabled);
        Ok(configs)
    }

    // ── Zones ────────────────────────────────────────────────────────

    /// Insert or replace by `(org_id, provider_id)`. Returns `true` if new.
    async fn upsert_zone(&self, zone: Zone) -> Result<bool, CoreError>;

    /// Zones of `org`, ordered by name.
    async fn zones(&self, org: &OrgId) -> Result<Vec<Zone>, CoreError>;

    // ── Records ──────────────────────────────────────────────────────

    /// Apply a provider sync by `(org_id, provider_id)`.
    ///
    /// New records start pending; existing ones keep their scan fields.
    async fn upsert_record(
        &self,
        sync: RecordSync,
        now: DateTime<Utc>,
    ) -> Result<DnsRecord, CoreError>;

    async fn record(&self, org: &OrgId, provider_id: &str)
    -> Result<Option<DnsRecord>, CoreError>;

    /// Records of `org`, ordered by hostname then provider id.
    async fn records(&self, org: &OrgId) -> Result<Vec<DnsRecord>, CoreError>;

    async fn records_with_status(
        &self,
        org: &OrgId,
        status: ExposureStatus,
    ) -> Result<Vec<DnsRecord>, CoreError> {
        let mut records = self.records(org).await?;
        records.retain(|r| r.exposure_status == status);
        Ok(records)
    }

    /// Overwrite a known record. Unknown records are a not-found error.
    async fn save_record(&self, record: DnsRecord) -> Result<(), CoreError>;

    // ── Scan logs ────────────────────────────────────────────────────

    /// Store a new log. A running log is refused with
    /// [`CoreError::ScanInProgress`] while another one is active for
    /// the same organization.
    async fn create_scan_log(&self, log: ScanLog) -> Result<(), CoreError>;

    /// Overwrite by id. A finished log releases the active-scan marker.
    async fn update_scan_log(&self, log: &ScanLog) -> Result<(), CoreError>;

    async fn scan_log(&self, id: Uuid) -> Result<Option<ScanLog>, CoreError>;

    /// Logs of `org`, newest first.
    async fn scan_logs(&self, org: &OrgId) -> Result<Vec<ScanLog>, CoreError>;

    /// The active scan of `org`, if any.
    async fn running_scan(&self, org: &OrgId) -> Result<Option<ScanLog>, CoreError>;

    /// Drop the active-scan marker of `org` if it still names `scan_id`,
    /// without touching the log itself. Used when a finished log cannot
    /// be written.
    async fn release_scan(&self, org: &OrgId, scan_id: Uuid) -> Result<(), CoreError>;
}
