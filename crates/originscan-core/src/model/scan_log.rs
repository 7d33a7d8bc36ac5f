use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::{ExposureStatus, OrgId};

/// Lifecycle of one scan execution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

/// What started a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user", rename_all = "lowercase")]
pub enum ScanTrigger {
    Scheduled,
    /// Manual trigger by the given user id.
    User(String),
}

impl fmt::Display for ScanTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => f.write_str("scheduled"),
            Self::User(user) => write!(f, "user:{user}"),
        }
    }
}

/// Per-phase progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounters {
    pub zones_scanned: usize,
    pub records_scanned: usize,
    /// Records to probe in the reachability phase.
    pub records_total: usize,
    pub checked: usize,
    pub public: usize,
    pub private: usize,
    pub unreachable: usize,
    pub error: usize,
    pub origin_exposed: usize,
}

impl ScanCounters {
    /// Count one classified probe.
    pub fn record_check(&mut self, status: ExposureStatus) {
        self.checked += 1;
        match status {
            ExposureStatus::Public => self.public += 1,
            ExposureStatus::Private => self.private += 1,
            ExposureStatus::Unreachable => self.unreachable += 1,
            ExposureStatus::Error => self.error += 1,
            ExposureStatus::Pending => {}
        }
    }
}

/// One scan execution for an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLog {
    pub id: Uuid,
    pub org_id: OrgId,
    pub triggered_by: ScanTrigger,
    pub status: ScanStatus,
    pub counters: ScanCounters,
    /// Hostname or zone most recently worked on, for live progress.
    pub current_domain: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ScanLog {
    /// A new running scan.
    pub fn start(org_id: OrgId, triggered_by: ScanTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            triggered_by,
            status: ScanStatus::Running,
            counters: ScanCounters::default(),
            current_domain: None,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ScanStatus::Running
    }

    pub fn complete(&mut self) {
        self.status = ScanStatus::Completed;
        self.current_domain = None;
        self.completed_at = Some(Utc::now());
    }

    /// Counters accumulated so far are kept for diagnostics.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ScanStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}
