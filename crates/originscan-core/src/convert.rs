// ── API-to-domain conversions ──
//
// Bridges `originscan_api` provider responses into `originscan_core::model`
// entities. Record types outside A/AAAA/CNAME are dropped here.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tracing::debug;

use originscan_api::provider_types::{DnsRecordResponse, ZoneResponse};

use crate::model::{OrgId, RecordSync, RecordType, Zone};

/// Canonical text form of a record target IP.
///
/// Parseable addresses are printed in their canonical form so `::1` and
/// `0:0:0:0:0:0:0:1` group together; anything else is trimmed and lowercased.
pub fn normalize_ip(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .parse::<IpAddr>()
        .map_or_else(|_| trimmed.to_ascii_lowercase(), |ip| ip.to_string())
}

fn normalize_hostname(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_ascii_lowercase()
}

pub fn zone_from_provider(org_id: &OrgId, zone: ZoneResponse, now: DateTime<Utc>) -> Zone {
    Zone {
        org_id: org_id.clone(),
        provider_id: zone.id,
        name: zone.name,
        status: zone.status,
        name_servers: zone.name_servers,
        last_synced_at: now,
    }
}

/// `None` for record types the scanner does not track.
pub fn record_sync_from_provider(
    org_id: &OrgId,
    zone_id: &str,
    record: DnsRecordResponse,
) -> Option<RecordSync> {
    let Ok(record_type) = record.record_type.parse::<RecordType>() else {
        debug!(record_type = %record.record_type, id = %record.id, "ignoring untracked record type");
        return None;
    };

    let content = if record_type.is_address() {
        normalize_ip(&record.content)
    } else {
        normalize_hostname(&record.content)
    };

    Some(RecordSync {
        org_id: org_id.clone(),
        provider_id: record.id,
        zone_id: record.zone_id.unwrap_or_else(|| zone_id.to_owned()),
        hostname: normalize_hostname(&record.name),
        record_type,
        content,
        proxied: record.proxied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(record_type: &str, name: &str, content: &str) -> DnsRecordResponse {
        DnsRecordResponse {
            id: "rec-1".into(),
            zone_id: None,
            zone_name: None,
            name: name.into(),
            record_type: record_type.into(),
            content: content.into(),
            proxied: true,
            proxiable: true,
            ttl: Some(1),
        }
    }

    #[test]
    fn ipv6_targets_are_canonicalized() {
        assert_eq!(
            normalize_ip("2001:0db8:0000:0000:0000:0000:0000:0001"),
            "2001:db8::1"
        );
        assert_eq!(normalize_ip(" 1.2.3.4 "), "1.2.3.4");
        assert_eq!(normalize_ip("Not-An-IP"), "not-an-ip");
    }

    #[test]
    fn record_conversion_fills_zone_and_normalizes() {
        let org = OrgId::from("acme");
        let sync = record_sync_from_provider(
            &org,
            "zone-9",
            response("AAAA", "WWW.Example.com.", "2001:db8:0::1"),
        )
        .expect("tracked type");
        assert_eq!(sync.zone_id, "zone-9");
        assert_eq!(sync.hostname, "www.example.com");
        assert_eq!(sync.record_type, RecordType::Aaaa);
        assert_eq!(sync.content, "2001:db8::1");
        assert!(sync.proxied);
    }

    #[test]
    fn untracked_types_are_dropped() {
        let org = OrgId::from("acme");
        let mx = response("MX", "example.com", "mail.example.com");
        assert!(record_sync_from_provider(&org, "z", mx).is_none());
    }
}
