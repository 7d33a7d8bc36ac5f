// ── Runtime scan configuration ──
//
// Describes how to scan one organization. Carries credential data but
// never touches disk; the CLI builds a `ScanConfig` and hands it in.

use secrecy::SecretString;
use url::Url;

use crate::model::OrgId;

/// Scan settings for one organization.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub org_id: OrgId,
    /// Provider API token. A scan refuses to start without one.
    pub api_token: Option<SecretString>,
    /// HTTP/HTTPS forward proxy for outbound probes.
    pub proxy_url: Option<Url>,
    /// Schedule expression as configured (e.g. a cron string).
    pub schedule: Option<String>,
    pub enabled: bool,
}

impl ScanConfig {
    pub fn new(org_id: OrgId) -> Self {
        Self {
            org_id,
            api_token: None,
            proxy_url: None,
            schedule: None,
            enabled: true,
        }
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.api_token = Some(token);
        self
    }

    pub fn with_proxy(mut self, proxy: Option<Url>) -> Self {
        self.proxy_url = proxy;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_token.is_some()
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: ScanConfigUpdate) {
        if let Some(token) = update.api_token {
            self.api_token = Some(token);
        }
        if let Some(proxy) = update.proxy_url {
            self.proxy_url = proxy;
        }
        if let Some(schedule) = update.schedule {
            self.schedule = schedule;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
    }
}

/// Partial change to an organization's scan configuration.
///
/// `None` leaves a field untouched; `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct ScanConfigUpdate {
    pub api_token: Option<SecretString>,
    pub proxy_url: Option<Option<Url>>,
    pub schedule: Option<Option<String>>,
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn update_touches_only_given_fields() {
        let mut config = ScanConfig::new(OrgId::from("acme"))
            .with_token(SecretString::from("old"))
            .with_proxy(Url::parse("http://proxy:3128").ok());
        config.schedule = Some("0 * * * *".into());

        config.apply(ScanConfigUpdate {
            schedule: Some(None),
            enabled: Some(false),
            ..ScanConfigUpdate::default()
        });

        assert_eq!(config.api_token.as_ref().map(|t| t.expose_secret()), Some("old"));
        assert!(config.proxy_url.is_some());
        assert!(config.schedule.is_none());
        assert!(!config.enabled);
    }
}
