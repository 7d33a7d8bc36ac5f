use thiserror::Error;

/// Top-level error type for the `originscan-api` crate.
///
/// Covers every failure mode of the provider API surface:
/// authentication, transport, envelope errors, and payload decoding.
/// `originscan-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// API token rejected by the provider (HTTP 401/403).
    #[error("Invalid API token: {message}")]
    InvalidToken { message: String },

    /// Token could not be turned into a request header.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Forward proxy URL was rejected by the HTTP stack.
    #[error("Invalid proxy {url}: {reason}")]
    Proxy { url: String, reason: String },

    /// Rate limited by the provider. Includes retry-after in seconds.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Provider API ────────────────────────────────────────────────
    /// Non-success envelope (`success: false`) or non-2xx status.
    #[error("Provider API error (HTTP {status}): {message}")]
    Provider {
        message: String,
        code: Option<i64>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the provider rejected our credential.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::InvalidToken { .. } | Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Provider { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Extract the provider error code, if available.
    pub fn api_error_code(&self) -> Option<i64> {
        match self {
            Self::Provider { code, .. } => *code,
            _ => None,
        }
    }
}
