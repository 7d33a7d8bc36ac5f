use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{ExposureStatus, OrgId, OriginExposureType};
use crate::probe::ProbeResult;

/// DNS record types the scanner tracks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
}

impl RecordType {
    /// A and AAAA point at an IP; CNAME points at another name.
    pub fn is_address(self) -> bool {
        matches!(self, Self::A | Self::Aaaa)
    }
}

/// Provider-owned fields of a record, as returned by a sync.
///
/// Applying a sync never touches the scan-derived fields of an
/// existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSync {
    pub org_id: OrgId,
    pub provider_id: String,
    pub zone_id: String,
    pub hostname: String,
    pub record_type: RecordType,
    pub content: String,
    pub proxied: bool,
}

/// One provider DNS record plus everything the scanner learned about it.
///
/// `(org_id, provider_id)` is the sole identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub org_id: OrgId,
    pub provider_id: String,
    pub zone_id: String,
    pub hostname: String,
    pub record_type: RecordType,
    /// Target IP (A/AAAA) or target hostname (CNAME).
    pub content: String,
    /// Traffic is routed through the CDN.
    pub proxied: bool,
    pub synced_at: DateTime<Utc>,

    // ── Reachability ─────────────────────────────────────────────────
    pub exposure_status: ExposureStatus,
    pub http_status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub check_error: Option<String>,

    // ── Origin exposure ──────────────────────────────────────────────
    pub origin_protected: Option<bool>,
    pub origin_exposure_type: Option<OriginExposureType>,
    pub origin_exposure_details: Option<String>,
}

impl DnsRecord {
    /// A freshly discovered record: pending, no origin verdict.
    pub fn from_sync(sync: RecordSync, now: DateTime<Utc>) -> Self {
        Self {
            org_id: sync.org_id,
            provider_id: sync.provider_id,
            zone_id: sync.zone_id,
            hostname: sync.hostname,
            record_type: sync.record_type,
            content: sync.content,
            proxied: sync.proxied,
            synced_at: now,
            exposure_status: ExposureStatus::Pending,
            http_status_code: None,
            response_time_ms: None,
            last_checked_at: None,
            check_error: None,
            origin_protected: None,
            origin_exposure_type: None,
            origin_exposure_details: None,
        }
    }

    /// Overwrite the provider-owned fields from a newer sync.
    pub fn apply_sync(&mut self, sync: RecordSync, now: DateTime<Utc>) {
        self.zone_id = sync.zone_id;
        self.hostname = sync.hostname;
        self.record_type = sync.record_type;
        self.content = sync.content;
        self.proxied = sync.proxied;
        self.synced_at = now;
    }

    /// Overwrite the reachability fields from a probe.
    pub fn apply_probe(&mut self, result: &ProbeResult, now: DateTime<Utc>) {
        self.exposure_status = result.status;
        self.http_status_code = result.http_status_code;
        self.response_time_ms = Some(result.response_time_ms);
        self.check_error.clone_from(&result.error);
        self.last_checked_at = Some(now);
    }

    /// Origin is protected by the CDN: no exposure.
    pub fn mark_origin_protected(&mut self) {
        self.origin_protected = Some(true);
        self.origin_exposure_type = None;
        self.origin_exposure_details = None;
    }

    /// Origin verdict does not apply to this record.
    pub fn clear_origin(&mut self) {
        self.origin_protected = None;
        self.origin_exposure_type = None;
        self.origin_exposure_details = None;
    }

    pub fn mark_origin_exposed(&mut self, kind: OriginExposureType, details: String) {
        self.origin_protected = Some(false);
        self.origin_exposure_type = Some(kind);
        self.origin_exposure_details = Some(details);
    }

    pub fn is_origin_exposed(&self) -> bool {
        self.origin_protected == Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync(content: &str, proxied: bool) -> RecordSync {
        RecordSync {
            org_id: OrgId::from("acme"),
            provider_id: "rec-1".into(),
            zone_id: "zone-1".into(),
            hostname: "a.example.com".into(),
            record_type: RecordType::A,
            content: content.into(),
            proxied,
        }
    }

    #[test]
    fn new_records_start_pending() {
        let record = DnsRecord::from_sync(sync("1.2.3.4", true), Utc::now());
        assert_eq!(record.exposure_status, ExposureStatus::Pending);
        assert_eq!(record.origin_protected, None);
        assert!(record.last_checked_at.is_none());
    }

    #[test]
    fn resync_keeps_scan_results() {
        let mut record = DnsRecord::from_sync(sync("1.2.3.4", true), Utc::now());
        record.apply_probe(
            &ProbeResult {
                status: ExposureStatus::Public,
                http_status_code: Some(200),
                response_time_ms: 42,
                error: None,
            },
            Utc::now(),
        );

        record.apply_sync(sync("5.6.7.8", false), Utc::now());

        assert_eq!(record.content, "5.6.7.8");
        assert!(!record.proxied);
        assert_eq!(record.exposure_status, ExposureStatus::Public);
        assert_eq!(record.http_status_code, Some(200));
    }

    #[test]
    fn record_type_parses_provider_strings() {
        assert_eq!("AAAA".parse::<RecordType>().ok(), Some(RecordType::Aaaa));
        assert_eq!("cname".parse::<RecordType>().ok(), Some(RecordType::Cname));
        assert!("MX".parse::<RecordType>().is_err());
        assert!(!RecordType::Cname.is_address());
    }
}
