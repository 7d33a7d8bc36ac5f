// HTTPS reachability probing.
//
// Issues a single GET per target and reports what happened on the wire:
// the HTTP status when one came back, otherwise a categorized transport
// failure. Never returns an error -- every outcome is a `RawProbe`.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use reqwest::header::{HOST, HeaderValue};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::{TlsMode, TransportConfig};

/// Hostname probe timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
/// Direct-to-origin probe timeout.
pub const DIRECT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Redirect hops followed by a hostname probe.
pub const PROBE_MAX_REDIRECTS: usize = 5;

// ── Failure categories ───────────────────────────────────────────────

/// Transport-level failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ConnectionRefused,
    DnsResolution,
    Timeout,
    ConnectionReset,
    ConnectionAborted,
    TlsHostnameMismatch,
    Other,
}

impl FailureKind {
    /// Stable identifier stored alongside the error message.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection_refused",
            Self::DnsResolution => "dns_resolution",
            Self::Timeout => "timeout",
            Self::ConnectionReset => "connection_reset",
            Self::ConnectionAborted => "connection_aborted",
            Self::TlsHostnameMismatch => "tls_hostname_mismatch",
            Self::Other => "other",
        }
    }

    /// The host cannot be reached at all, as opposed to an unexpected error.
    pub fn is_unreachable(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized transport failure with the full error chain as message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Categorize a `reqwest` error by walking its source chain.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        Self {
            kind: classify_error(err),
            message: error_chain(err),
        }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

fn classify_error(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::Timeout;
    }

    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return FailureKind::ConnectionRefused,
                io::ErrorKind::ConnectionReset => return FailureKind::ConnectionReset,
                io::ErrorKind::ConnectionAborted => return FailureKind::ConnectionAborted,
                io::ErrorKind::TimedOut => return FailureKind::Timeout,
                _ => {}
            }
        }

        let text = current.to_string().to_ascii_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("no such host")
        {
            return FailureKind::DnsResolution;
        }
        if text.contains("notvalidforname")
            || text.contains("not valid for name")
            || text.contains("hostname mismatch")
        {
            return FailureKind::TlsHostnameMismatch;
        }

        source = current.source();
    }

    FailureKind::Other
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(current) = source {
        let text = current.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        source = current.source();
    }
    parts.join(": ")
}

// ── Probe outcome ────────────────────────────────────────────────────

/// What a single request observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProbe {
    /// HTTP status of the final response, if one arrived.
    pub status: Option<u16>,
    pub failure: Option<ProbeFailure>,
    /// Wall-clock time from request start to outcome.
    pub elapsed: Duration,
}

impl RawProbe {
    /// Any status in [200, 600) other than 403.
    ///
    /// The success criterion for a direct-to-origin probe.
    pub fn origin_answered(&self) -> bool {
        matches!(self.status, Some(code) if (200..600).contains(&code) && code != 403)
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// HTTPS prober for one organization's outbound settings.
///
/// Holds two clients: a verifying one for hostname probes and an
/// unverified one used only for direct-to-origin probes by IP.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    http: reqwest::Client,
    direct: reqwest::Client,
}

impl ProbeClient {
    /// Standard prober: 15s / 5 redirects for hostnames, 10s for origins,
    /// both routed through `proxy` when set.
    pub fn new(proxy: Option<Url>) -> Result<Self, Error> {
        let probe = TransportConfig {
            tls: TlsMode::System,
            timeout: PROBE_TIMEOUT,
            proxy: proxy.clone(),
            max_redirects: PROBE_MAX_REDIRECTS,
        };
        let direct = TransportConfig {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: DIRECT_PROBE_TIMEOUT,
            proxy,
            max_redirects: 0,
        };
        Self::with_transports(&probe, &direct)
    }

    pub fn with_transports(probe: &TransportConfig, direct: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: probe.build_client()?,
            direct: direct.build_client()?,
        })
    }

    /// `GET https://{hostname}`.
    pub async fn probe_host(&self, hostname: &str) -> RawProbe {
        match Url::parse(&format!("https://{hostname}")) {
            Ok(url) => self.probe_url(url).await,
            Err(e) => RawProbe {
                status: None,
                failure: Some(ProbeFailure::new(
                    FailureKind::Other,
                    format!("invalid hostname {hostname:?}: {e}"),
                )),
                elapsed: Duration::ZERO,
            },
        }
    }

    /// `GET` an arbitrary URL with the hostname-probe client.
    pub async fn probe_url(&self, url: Url) -> RawProbe {
        debug!("PROBE {url}");
        let started = Instant::now();
        let result = self.http.get(url).send().await;
        finish(result, started)
    }

    /// `GET https://{ip}` with `Host: {host}` and certificate checks off.
    pub async fn probe_origin(&self, ip: IpAddr, host: &str) -> RawProbe {
        let raw = match ip {
            IpAddr::V4(v4) => format!("https://{v4}/"),
            IpAddr::V6(v6) => format!("https://[{v6}]/"),
        };
        match Url::parse(&raw) {
            Ok(url) => self.probe_origin_url(url, host).await,
            Err(e) => RawProbe {
                status: None,
                failure: Some(ProbeFailure::new(FailureKind::Other, e.to_string())),
                elapsed: Duration::ZERO,
            },
        }
    }

    /// Direct-origin probe against an explicit URL.
    pub async fn probe_origin_url(&self, url: Url, host: &str) -> RawProbe {
        debug!(host, "PROBE ORIGIN {url}");
        let started = Instant::now();

        let host_value = match HeaderValue::from_str(host) {
            Ok(value) => value,
            Err(e) => {
                return RawProbe {
                    status: None,
                    failure: Some(ProbeFailure::new(
                        FailureKind::Other,
                        format!("invalid Host header {host:?}: {e}"),
                    )),
                    elapsed: started.elapsed(),
                };
            }
        };

        let result = self.direct.get(url).header(HOST, host_value).send().await;
        finish(result, started)
    }
}

fn finish(result: Result<reqwest::Response, reqwest::Error>, started: Instant) -> RawProbe {
    match result {
        Ok(resp) => RawProbe {
            status: Some(resp.status().as_u16()),
            failure: None,
            elapsed: started.elapsed(),
        },
        Err(e) => RawProbe {
            status: e.status().map(|s| s.as_u16()),
            failure: Some(ProbeFailure::from_reqwest(&e)),
            elapsed: started.elapsed(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_with(status: Option<u16>) -> RawProbe {
        RawProbe {
            status,
            failure: None,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn origin_answered_excludes_forbidden() {
        assert!(probe_with(Some(200)).origin_answered());
        assert!(probe_with(Some(502)).origin_answered());
        assert!(!probe_with(Some(403)).origin_answered());
        assert!(!probe_with(None).origin_answered());
    }

    #[test]
    fn only_other_is_reachable_failure() {
        assert!(FailureKind::ConnectionRefused.is_unreachable());
        assert!(FailureKind::TlsHostnameMismatch.is_unreachable());
        assert!(!FailureKind::Other.is_unreachable());
    }

    #[tokio::test]
    async fn invalid_hostname_is_other_failure() {
        let client = ProbeClient::new(None).expect("client");
        let raw = client.probe_host("bad host name").await;
        assert_eq!(raw.status, None);
        assert_eq!(raw.failure.map(|f| f.kind), Some(FailureKind::Other));
    }
}
