//! Configuration for the originscan CLI.
//!
//! TOML organization profiles, credential resolution (env + keyring +
//! plaintext), and translation to `originscan_core::ScanConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use originscan_core::{OrgId, ScanConfig};

const KEYRING_SERVICE: &str = "originscan";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for organization '{org}'")]
    NoCredentials { org: String },

    #[error("unknown organization '{org}'")]
    UnknownOrganization { org: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Organizations keyed by id.
    #[serde(default)]
    pub organizations: BTreeMap<String, OrganizationProfile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Provider API root.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Provider request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between scheduled passes in daemon mode.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,

    #[serde(default = "default_output")]
    pub output: String,

    /// Scan state snapshot. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            provider_url: default_provider_url(),
            timeout: default_timeout(),
            scan_interval: default_scan_interval(),
            output: default_output(),
            state_file: None,
        }
    }
}

fn default_provider_url() -> String {
    "https://api.cloudflare.com/client/v4/".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_scan_interval() -> u64 {
    3600
}
fn default_output() -> String {
    "table".into()
}
fn default_enabled() -> bool {
    true
}

/// One organization's scan settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrganizationProfile {
    /// API token (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Environment variable name containing the API token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token_env: Option<String>,

    /// HTTP/HTTPS forward proxy for outbound probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    /// Schedule expression, kept for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for OrganizationProfile {
    fn default() -> Self {
        Self {
            api_token: None,
            api_token_env: None,
            proxy_url: None,
            schedule: None,
            enabled: true,
        }
    }
}

impl Config {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.defaults.scan_interval.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.timeout)
    }

    pub fn organization(&self, org: &str) -> Result<&OrganizationProfile, ConfigError> {
        self.organizations
            .get(org)
            .ok_or_else(|| ConfigError::UnknownOrganization { org: org.into() })
    }

    /// Every organization as a `ScanConfig`, credentials resolved.
    pub fn scan_configs(&self) -> Result<Vec<ScanConfig>, ConfigError> {
        self.organizations
            .iter()
            .map(|(name, profile)| profile_to_scan_config(profile, name))
            .collect()
    }

    /// Snapshot location: `defaults.state_file`, else the data dir.
    pub fn state_path(&self) -> PathBuf {
        self.defaults.state_file.clone().unwrap_or_else(state_path)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "originscan", "originscan")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default snapshot file under the platform data dir.
pub fn state_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join("state.json"),
        |dirs| dirs.data_dir().join("state.json"),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("originscan");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` layered under `ORIGINSCAN_*` env vars.
///
/// Nested keys use a double underscore, e.g.
/// `ORIGINSCAN_DEFAULTS__SCAN_INTERVAL=600`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ORIGINSCAN_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credentials ─────────────────────────────────────────────────────

fn keyring_entry(org: &str) -> Result<keyring::Entry, ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{org}/api-token"))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Resolve an API token: profile env var, then keyring, then plaintext.
pub fn resolve_api_token(
    profile: &OrganizationProfile,
    org: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's api_token_env → env var lookup
    if let Some(ref env_name) = profile.api_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(org) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.api_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials { org: org.into() })
}

/// Store a token in the OS keyring for `org`.
pub fn store_api_token(org: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(org)?
        .set_password(token)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Drop `org`'s keyring token. A missing entry is not an error.
pub fn delete_api_token(org: &str) -> Result<(), ConfigError> {
    match keyring_entry(org)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(ConfigError::Keyring(e.to_string())),
    }
}

// ── Recording a token ───────────────────────────────────────────────

/// Token storage outside the config file.
pub trait TokenVault {
    fn store(&self, org: &str, token: &str) -> Result<(), ConfigError>;
    fn delete(&self, org: &str) -> Result<(), ConfigError>;
}

/// The OS keyring, under service `originscan`.
pub struct SystemKeyring;

impl TokenVault for SystemKeyring {
    fn store(&self, org: &str, token: &str) -> Result<(), ConfigError> {
        store_api_token(org, token)
    }

    fn delete(&self, org: &str) -> Result<(), ConfigError> {
        delete_api_token(org)
    }
}

/// Where a verified token is kept.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Read from this environment variable at run time.
    Env(String),
    Plaintext(SecretString),
    Keyring(SecretString),
}

/// Point `profile` at `source` and clear every other credential of
/// `org`, so [`resolve_api_token`] returns the token just recorded.
///
/// A keyring that cannot be reached while clearing is only logged: a
/// token it holds cannot be resolved either.
pub fn record_api_token(
    profile: &mut OrganizationProfile,
    org: &str,
    source: &TokenSource,
    vault: &dyn TokenVault,
) -> Result<(), ConfigError> {
    match source {
        TokenSource::Env(name) => {
            clear_vault(vault, org);
            profile.api_token_env = Some(name.clone());
            profile.api_token = None;
        }
        TokenSource::Plaintext(token) => {
            clear_vault(vault, org);
            profile.api_token = Some(token.expose_secret().to_owned());
            profile.api_token_env = None;
        }
        TokenSource::Keyring(token) => {
            vault.store(org, token.expose_secret())?;
            profile.api_token = None;
            profile.api_token_env = None;
        }
    }
    Ok(())
}

fn clear_vault(vault: &dyn TokenVault, org: &str) {
    if let Err(e) = vault.delete(org) {
        tracing::warn!(org, error = %e, "could not clear stored token");
    }
}

pub fn parse_proxy_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "proxy_url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "proxy_url".into(),
            reason: format!("expected an http or https proxy, got '{other}'"),
        }),
    }
}

/// Build a `ScanConfig` from a profile.
///
/// A missing credential is left as `None`: the scan itself reports it,
/// so one unconfigured organization does not break the others.
pub fn profile_to_scan_config(
    profile: &OrganizationProfile,
    org: &str,
) -> Result<ScanConfig, ConfigError> {
    let proxy_url = profile
        .proxy_url
        .as_deref()
        .map(parse_proxy_url)
        .transpose()?;

    Ok(ScanConfig {
        org_id: OrgId::from(org),
        api_token: resolve_api_token(profile, org).ok(),
        proxy_url,
        schedule: profile.schedule.clone(),
        enabled: profile.enabled,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// In-memory stand-in for the OS keyring.
    #[derive(Default)]
    struct MemoryVault {
        tokens: RefCell<HashMap<String, String>>,
        unreachable: bool,
    }

    impl TokenVault for MemoryVault {
        fn store(&self, org: &str, token: &str) -> Result<(), ConfigError> {
            self.tokens.borrow_mut().insert(org.into(), token.into());
            Ok(())
        }

        fn delete(&self, org: &str) -> Result<(), ConfigError> {
            if self.unreachable {
                return Err(ConfigError::Keyring("no secret service".into()));
            }
            self.tokens.borrow_mut().remove(org);
            Ok(())
        }
    }

    const SAMPLE: &str = r#"
[defaults]
scan_interval = 600
output = "json"

[organizations.acme]
api_token = "plain-token"
proxy_url = "http://proxy.internal:3128"
schedule = "0 */6 * * *"

[organizations.globex]
enabled = false
"#;

    #[test]
    fn loads_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg.defaults.scan_interval, 600);
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 30);
        assert_eq!(cfg.scan_interval(), Duration::from_secs(600));
        assert_eq!(cfg.organizations.len(), 2);
        assert!(cfg.organizations["acme"].enabled);
        assert!(!cfg.organizations["globex"].enabled);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.defaults.provider_url, "https://api.cloudflare.com/client/v4/");
        assert!(cfg.organizations.is_empty());
    }

    #[test]
    fn save_then_load_keeps_organizations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.organizations.insert(
            "acme".into(),
            OrganizationProfile {
                api_token_env: Some("ACME_CF_TOKEN".into()),
                schedule: Some("@hourly".into()),
                ..OrganizationProfile::default()
            },
        );

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        let acme = loaded.organization("acme").unwrap();
        assert_eq!(acme.api_token_env.as_deref(), Some("ACME_CF_TOKEN"));
        assert_eq!(acme.schedule.as_deref(), Some("@hourly"));
        assert!(matches!(
            loaded.organization("nope"),
            Err(ConfigError::UnknownOrganization { .. })
        ));
    }

    #[test]
    fn env_var_wins_over_plaintext() {
        // PATH is always present in a test process.
        let expected = std::env::var("PATH").unwrap();
        let profile = OrganizationProfile {
            api_token: Some("plain".into()),
            api_token_env: Some("PATH".into()),
            ..OrganizationProfile::default()
        };
        let token = resolve_api_token(&profile, "originscan-test-env").unwrap();
        assert_eq!(token.expose_secret(), expected);
    }

    #[test]
    fn profile_translates_to_scan_config() {
        let profile = OrganizationProfile {
            api_token: Some("plain".into()),
            proxy_url: Some("http://proxy.internal:3128".into()),
            schedule: Some("0 * * * *".into()),
            ..OrganizationProfile::default()
        };
        let config = profile_to_scan_config(&profile, "originscan-test-acme").unwrap();
        assert_eq!(config.org_id.as_str(), "originscan-test-acme");
        assert!(config.has_credential());
        assert_eq!(
            config.proxy_url.as_ref().map(url::Url::as_str),
            Some("http://proxy.internal:3128/")
        );
        assert!(config.enabled);
    }

    #[test]
    fn bad_proxy_is_a_validation_error() {
        let profile = OrganizationProfile {
            proxy_url: Some("socks5://proxy:1080".into()),
            ..OrganizationProfile::default()
        };
        assert!(matches!(
            profile_to_scan_config(&profile, "originscan-test-bad"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(parse_proxy_url("not a url").is_err());
    }

    #[test]
    fn plaintext_token_clears_a_stale_keyring_entry() {
        let vault = MemoryVault::default();
        vault.store("acme", "old-token").unwrap();
        let mut profile = OrganizationProfile {
            api_token_env: Some("OLD_VAR".into()),
            ..OrganizationProfile::default()
        };

        let source = TokenSource::Plaintext(SecretString::from("new-token"));
        record_api_token(&mut profile, "acme", &source, &vault).unwrap();

        assert!(vault.tokens.borrow().is_empty());
        assert_eq!(profile.api_token.as_deref(), Some("new-token"));
        assert!(profile.api_token_env.is_none());
    }

    #[test]
    fn env_token_clears_keyring_and_plaintext() {
        let vault = MemoryVault::default();
        vault.store("acme", "old-token").unwrap();
        let mut profile = OrganizationProfile {
            api_token: Some("old-plain".into()),
            ..OrganizationProfile::default()
        };

        let source = TokenSource::Env("ACME_TOKEN".into());
        record_api_token(&mut profile, "acme", &source, &vault).unwrap();

        assert!(vault.tokens.borrow().is_empty());
        assert!(profile.api_token.is_none());
        assert_eq!(profile.api_token_env.as_deref(), Some("ACME_TOKEN"));
    }

    #[test]
    fn keyring_token_replaces_plaintext() {
        let vault = MemoryVault::default();
        let mut profile = OrganizationProfile {
            api_token: Some("old-plain".into()),
            ..OrganizationProfile::default()
        };

        let source = TokenSource::Keyring(SecretString::from("new-token"));
        record_api_token(&mut profile, "acme", &source, &vault).unwrap();

        assert_eq!(vault.tokens.borrow().get("acme").map(String::as_str), Some("new-token"));
        assert!(profile.api_token.is_none());
    }

    #[test]
    fn unreachable_keyring_still_records_plaintext() {
        let vault = MemoryVault {
            unreachable: true,
            ..MemoryVault::default()
        };
        let mut profile = OrganizationProfile::default();

        let source = TokenSource::Plaintext(SecretString::from("new-token"));
        record_api_token(&mut profile, "acme", &source, &vault).unwrap();

        assert_eq!(profile.api_token.as_deref(), Some("new-token"));
    }
}
