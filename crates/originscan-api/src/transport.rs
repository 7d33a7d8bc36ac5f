// Shared transport configuration for building reqwest::Client instances.
//
// The provider client, the reachability prober and the direct-to-origin
// prober all build their HTTP clients here so timeout, proxy and TLS
// handling stay in one place.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::redirect;
use url::Url;

use crate::error::Error;

const USER_AGENT: &str = concat!("originscan/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the bundled web PKI roots.
    #[default]
    System,
    /// Accept any certificate.
    ///
    /// Only the direct-to-origin probe uses this: an origin reached by bare
    /// IP will never present a certificate matching that IP.
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Optional HTTP/HTTPS forward proxy for all outbound requests.
    pub proxy: Option<Url>,
    /// Maximum redirects to follow. `0` disables redirect following.
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            proxy: None,
            max_redirects: 10,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.build_client_with_headers(HeaderMap::new())
    }

    /// Build a `reqwest::Client` with additional default headers.
    ///
    /// Used by the provider client to inject the bearer token.
    pub fn build_client_with_headers(&self, headers: HeaderMap) -> Result<reqwest::Client, Error> {
        let redirects = if self.max_redirects == 0 {
            redirect::Policy::none()
        } else {
            redirect::Policy::limited(self.max_redirects)
        };

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .redirect(redirects)
            .default_headers(headers);

        if self.tls == TlsMode::DangerAcceptInvalid {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = self.proxy {
            let proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| Error::Proxy {
                url: proxy_url.to_string(),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Route requests through the given forward proxy.
    pub fn with_proxy(mut self, proxy: Option<Url>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
