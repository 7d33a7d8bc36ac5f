// ── Reachability probing ──
//
// Turns raw wire observations from `originscan_api::ProbeClient` into
// classified `ProbeResult`s. Probing never fails: every outcome,
// including a crashed task, is a classification.

use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;

use originscan_api::{ProbeClient, RawProbe};

use crate::model::{ExposureStatus, classify};

/// Classified outcome of one hostname probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub status: ExposureStatus,
    pub http_status_code: Option<u16>,
    /// Wall-clock time, recorded for failures too.
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl ProbeResult {
    /// Classify a raw wire observation.
    pub fn from_raw(raw: &RawProbe) -> Self {
        let failure_kind = raw.failure.as_ref().map(|f| f.kind);
        let status = classify(raw.status, failure_kind);
        let error = match status {
            ExposureStatus::Public | ExposureStatus::Private => None,
            _ => raw.failure.as_ref().map(ToString::to_string),
        };

        Self {
            status,
            http_status_code: raw.status,
            response_time_ms: u64::try_from(raw.elapsed.as_millis()).unwrap_or(u64::MAX),
            error,
        }
    }

    /// A probe task that panicked or was cancelled.
    pub fn task_failed(err: &JoinError) -> Self {
        Self {
            status: ExposureStatus::Error,
            http_status_code: None,
            response_time_ms: 0,
            error: Some(format!("probe task failed: {err}")),
        }
    }
}

/// Outbound probing seam. Implementations are bound to one
/// organization's proxy settings at construction.
#[async_trait]
pub trait Prober: Send + Sync {
    /// `GET https://{hostname}` and classify the outcome.
    async fn probe(&self, hostname: &str) -> ProbeResult;

    /// Whether the origin at `ip` answers a direct request for `hostname`.
    async fn probe_origin(&self, ip: IpAddr, hostname: &str) -> bool;
}

/// `Prober` over real HTTPS.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: ProbeClient,
}

impl HttpProber {
    pub fn new(client: ProbeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, hostname: &str) -> ProbeResult {
        let raw = self.client.probe_host(hostname).await;
        ProbeResult::from_raw(&raw)
    }

    async fn probe_origin(&self, ip: IpAddr, hostname: &str) -> bool {
        self.client.probe_origin(ip, hostname).await.origin_answered()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use originscan_api::{FailureKind, ProbeFailure};

    use super::*;

    fn raw(status: Option<u16>, failure: Option<ProbeFailure>) -> RawProbe {
        RawProbe {
            status,
            failure,
            elapsed: Duration::from_millis(120),
        }
    }

    #[test]
    fn answered_probe_has_no_error() {
        let result = ProbeResult::from_raw(&raw(Some(403), None));
        assert_eq!(result.status, ExposureStatus::Private);
        assert_eq!(result.http_status_code, Some(403));
        assert_eq!(result.response_time_ms, 120);
        assert!(result.error.is_none());
    }

    #[test]
    fn failure_keeps_kind_and_message() {
        let failure = ProbeFailure::new(FailureKind::ConnectionRefused, "tcp connect error");
        let result = ProbeResult::from_raw(&raw(None, Some(failure)));
        assert_eq!(result.status, ExposureStatus::Unreachable);
        assert_eq!(
            result.error.as_deref(),
            Some("connection_refused: tcp connect error")
        );
        assert_eq!(result.response_time_ms, 120);
    }

    #[test]
    fn unknown_failure_is_error_with_message() {
        let failure = ProbeFailure::new(FailureKind::Other, "too many redirects");
        let result = ProbeResult::from_raw(&raw(None, Some(failure)));
        assert_eq!(result.status, ExposureStatus::Error);
        assert_eq!(result.error.as_deref(), Some("other: too many redirects"));
    }

    #[tokio::test]
    async fn panicked_task_becomes_error() {
        let handle = tokio::spawn(async { panic!("boom") });
        let err = handle.await.expect_err("task should panic");
        let result = ProbeResult::task_failed(&err);
        assert_eq!(result.status, ExposureStatus::Error);
        assert!(result.error.is_some_and(|e| e.contains("probe task failed")));
    }
}
