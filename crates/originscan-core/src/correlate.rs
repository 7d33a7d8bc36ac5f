// ── Origin correlation ──
//
// Groups one organization's address records by target IP and
// cross-references proxied against unproxied records. An IP that is both
// behind the CDN and published directly leaks the origin. No provider
// calls happen here; the only network traffic is the optional
// direct-to-origin probe per leaked proxied record.

use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::convert::normalize_ip;
use crate::model::{DnsRecord, OriginExposureType};
use crate::probe::Prober;

/// Outcome of one correlation pass.
#[derive(Debug, Clone)]
pub struct Correlation {
    /// Every input record with origin fields rewritten.
    pub records: Vec<DnsRecord>,
    /// Proxied records whose origin is exposed.
    pub exposed: usize,
}

#[derive(Default)]
struct IpGroup {
    proxied: Vec<usize>,
    direct: Vec<usize>,
}

/// Classify the origin exposure of every record in the set.
pub async fn correlate(mut records: Vec<DnsRecord>, prober: &dyn Prober) -> Correlation {
    let mut processed: HashSet<String> = HashSet::with_capacity(records.len());
    let mut groups: BTreeMap<String, IpGroup> = BTreeMap::new();

    for (idx, record) in records.iter_mut().enumerate() {
        if !processed.insert(record.provider_id.clone()) {
            continue;
        }
        if !record.record_type.is_address() {
            record.clear_origin();
            continue;
        }
        let group = groups.entry(normalize_ip(&record.content)).or_default();
        if record.proxied {
            group.proxied.push(idx);
        } else {
            group.direct.push(idx);
        }
    }

    let mut exposed = 0;
    for (ip, group) in &groups {
        match (group.proxied.is_empty(), group.direct.is_empty()) {
            (false, false) => {
                exposed += mark_leak(&mut records, ip, group, prober).await;
            }
            (false, true) => {
                for &idx in &group.proxied {
                    if let Some(record) = records.get_mut(idx) {
                        record.mark_origin_protected();
                    }
                }
            }
            (true, false) => {
                for &idx in &group.direct {
                    if let Some(record) = records.get_mut(idx) {
                        record.clear_origin();
                    }
                }
            }
            (true, true) => {}
        }
    }

    info!(groups = groups.len(), exposed, "origin correlation finished");
    Correlation { records, exposed }
}

fn hostnames(records: &[DnsRecord], indices: &[usize]) -> String {
    indices
        .iter()
        .filter_map(|&idx| records.get(idx))
        .map(|r| r.hostname.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Mark both buckets of a leaking IP. Returns the proxied records marked.
async fn mark_leak(
    records: &mut [DnsRecord],
    ip: &str,
    group: &IpGroup,
    prober: &dyn Prober,
) -> usize {
    let direct_hosts = hostnames(records, &group.direct);
    let proxied_hosts = hostnames(records, &group.proxied);
    let parsed_ip = ip.parse::<IpAddr>().ok();

    let probes = group.proxied.iter().map(|&idx| {
        let hostname = records.get(idx).map(|r| r.hostname.clone()).unwrap_or_default();
        async move {
            let answered = match parsed_ip {
                Some(addr) => prober.probe_origin(addr, &hostname).await,
                None => false,
            };
            (idx, answered)
        }
    });
    let outcomes = join_all(probes).await;

    let mut marked = 0;
    for (idx, answered) in outcomes {
        let Some(record) = records.get_mut(idx) else {
            continue;
        };
        let (kind, details) = if answered {
            (
                OriginExposureType::Both,
                format!(
                    "Origin IP {ip} is published by unproxied record(s) {direct_hosts} \
                     and answers direct HTTPS requests for {}",
                    record.hostname
                ),
            )
        } else {
            (
                OriginExposureType::IpLeak,
                format!("Origin IP {ip} is published by unproxied record(s) {direct_hosts}"),
            )
        };
        debug!(hostname = %record.hostname, ip, %kind, "origin exposed");
        record.mark_origin_exposed(kind, details);
        marked += 1;
    }

    for &idx in &group.direct {
        if let Some(record) = records.get_mut(idx) {
            record.mark_origin_exposed(
                OriginExposureType::IpLeak,
                format!("Publishes origin IP {ip} of proxied record(s) {proxied_hosts}"),
            );
        }
    }

    marked
}
