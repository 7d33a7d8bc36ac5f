//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use originscan_config::ConfigError;
use originscan_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the provider at {url}")]
    #[diagnostic(
        code(originscan::connection_failed),
        help(
            "Check network access and --provider-url.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Provider request timed out")]
    #[diagnostic(
        code(originscan::timeout),
        help("Increase the timeout with --timeout or `defaults.timeout`.")
    )]
    Timeout,

    #[error("Rate limited by the provider")]
    #[diagnostic(
        code(originscan::rate_limited),
        help("Retry in {retry_after_secs}s.")
    )]
    RateLimited { retry_after_secs: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(originscan::auth_failed),
        help(
            "Verify the organization's API token.\n\
             It needs Zone:Read and DNS:Read permissions."
        )
    )]
    AuthFailed { message: String },

    #[error("API token for organization '{org}' was rejected")]
    #[diagnostic(
        code(originscan::invalid_credential),
        help("Set a new token with: originscan orgs set {org} --prompt-token")
    )]
    InvalidCredential { org: String },

    #[error("No credentials configured for organization '{org}'")]
    #[diagnostic(
        code(originscan::no_credentials),
        help(
            "Configure one with: originscan orgs set {org} --prompt-token\n\
             Or point `api_token_env` at an environment variable."
        )
    )]
    NoCredentials { org: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(originscan::not_found),
        help("Run: originscan {list_command}")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("A scan is already running for organization '{org}'")]
    #[diagnostic(
        code(originscan::scan_in_progress),
        help("Wait for scan {scan_id} to finish: originscan scan show {scan_id}")
    )]
    ScanInProgress { org: String, scan_id: String },

    #[error("{failed} of {total} scheduled scans failed")]
    #[diagnostic(
        code(originscan::scans_failed),
        help("Inspect each failure with: originscan scan logs <org>")
    )]
    ScansFailed { failed: usize, total: usize },

    // ── Provider ─────────────────────────────────────────────────────
    #[error("Provider error: {message}")]
    #[diagnostic(code(originscan::provider_error))]
    Provider { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(originscan::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(originscan::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    #[diagnostic(code(originscan::config))]
    Config { message: String },

    // ── Storage / internal ───────────────────────────────────────────
    #[error("Scan state error: {message}")]
    #[diagnostic(
        code(originscan::state),
        help("The snapshot lives at `defaults.state_file` or --state.")
    )]
    State { message: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(originscan::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::InvalidCredential { .. } | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::ScanInProgress { .. } => exit_code::CONFLICT,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn not_found(resource_type: &str, identifier: &str, list_command: &str) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
            list_command: list_command.into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::RateLimited { retry_after_secs } => CliError::RateLimited { retry_after_secs },
            CoreError::InvalidCredential { org } => CliError::InvalidCredential {
                org: org.to_string(),
            },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => {
                let list_command = match entity_type.as_str() {
                    "organization" => "orgs list".to_owned(),
                    "scan" => "scan logs <org>".to_owned(),
                    _ => "records list <org>".to_owned(),
                };
                CliError::NotFound {
                    resource_type: entity_type,
                    identifier,
                    list_command,
                }
            }
            CoreError::ScanInProgress { org, scan_id } => CliError::ScanInProgress {
                org: org.to_string(),
                scan_id: scan_id.to_string(),
            },
            CoreError::Provider { message, code, .. } => CliError::Provider {
                message: match code {
                    Some(code) => format!("{message} (code {code})"),
                    None => message,
                },
            },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Store { message } => CliError::State { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { org } => CliError::NoCredentials { org },
            ConfigError::UnknownOrganization { org } => {
                CliError::not_found("organization", &org, "orgs list")
            }
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use originscan_core::OrgId;

    use super::*;

    #[test]
    fn conflicts_and_auth_have_distinct_exit_codes() {
        let conflict = CliError::from(CoreError::ScanInProgress {
            org: OrgId::from("acme"),
            scan_id: uuid::Uuid::nil(),
        });
        assert_eq!(conflict.exit_code(), exit_code::CONFLICT);

        let auth = CliError::from(CoreError::InvalidCredential {
            org: OrgId::from("acme"),
        });
        assert_eq!(auth.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn unknown_organization_is_not_found() {
        let err = CliError::from(ConfigError::UnknownOrganization { org: "x".into() });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
    }
}
