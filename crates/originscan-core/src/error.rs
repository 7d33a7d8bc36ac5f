// ── Core error types ──
//
// User-facing errors from originscan-core. Consumers never see raw HTTP
// errors or JSON parse failures; the `From<originscan_api::Error>` impl
// translates transport-layer errors into domain variants.

use thiserror::Error;
use uuid::Uuid;

use crate::model::OrgId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to provider at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Provider request timed out")]
    Timeout,

    #[error("Rate limited by provider -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("API credential for organization '{org}' was rejected by the provider")]
    InvalidCredential { org: OrgId },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Conflicts ────────────────────────────────────────────────────
    #[error("A scan is already running for organization '{org}' (scan {scan_id})")]
    ScanInProgress { org: OrgId, scan_id: Uuid },

    // ── Provider errors (wrapped, not exposed raw) ───────────────────
    #[error("Provider error: {message}")]
    Provider {
        message: String,
        /// Provider-specific error code from the response envelope.
        code: Option<i64>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Storage errors ───────────────────────────────────────────────
    #[error("Store error: {message}")]
    Store { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity_type: &str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<originscan_api::Error> for CoreError {
    fn from(err: originscan_api::Error) -> Self {
        match err {
            originscan_api::Error::InvalidToken { message }
            | originscan_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            originscan_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Provider {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            originscan_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            originscan_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            originscan_api::Error::Proxy { url, reason } => CoreError::Config {
                message: format!("Invalid proxy {url}: {reason}"),
            },
            originscan_api::Error::RateLimited { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            originscan_api::Error::Provider {
                message,
                code,
                status,
            } => CoreError::Provider {
                message,
                code,
                status: Some(status),
            },
            originscan_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_envelope_error_keeps_code_and_status() {
        let err = CoreError::from(originscan_api::Error::Provider {
            message: "zone not found".into(),
            code: Some(1001),
            status: 404,
        });
        assert!(matches!(
            err,
            CoreError::Provider {
                code: Some(1001),
                status: Some(404),
                ..
            }
        ));
    }

    #[test]
    fn invalid_token_becomes_authentication_failure() {
        let err = CoreError::from(originscan_api::Error::InvalidToken {
            message: "Authentication error".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }
}
