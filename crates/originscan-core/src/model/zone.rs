use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OrgId;

/// A provider-side DNS zone mirrored for one organization.
///
/// `(org_id, provider_id)` is the natural key. Zones are upserted on every
/// sync and never deleted by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub org_id: OrgId,
    pub provider_id: String,
    pub name: String,
    pub status: String,
    pub name_servers: Vec<String>,
    pub last_synced_at: DateTime<Utc>,
}
