// ── Client construction ──
//
// Builds per-organization provider and prober clients from a
// `ScanConfig`. Nothing here is global: each scan asks the connector
// for fresh clients bound to that organization's credential and proxy.

use std::sync::Arc;

use secrecy::SecretString;
use url::Url;

use originscan_api::{ProbeClient, ProviderClient, TransportConfig};

use crate::config::ScanConfig;
use crate::error::CoreError;
use crate::probe::{HttpProber, Prober};
use crate::provider::DnsProvider;

/// Factory for the outbound clients one scan needs.
pub trait Connector: Send + Sync {
    /// Provider client authenticated with the organization's credential.
    fn provider(&self, config: &ScanConfig) -> Result<Arc<dyn DnsProvider>, CoreError>;

    /// Provider client for a credential that is not yet persisted.
    fn provider_for_token(&self, token: &SecretString) -> Result<Arc<dyn DnsProvider>, CoreError>;

    /// Prober routed through `proxy` when set.
    fn prober(&self, proxy: Option<&Url>) -> Result<Arc<dyn Prober>, CoreError>;
}

/// `Connector` producing real HTTP clients.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    provider_url: String,
    transport: TransportConfig,
}

impl HttpConnector {
    pub fn new(provider_url: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            provider_url: provider_url.into(),
            transport,
        }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(
            originscan_api::provider::DEFAULT_BASE_URL,
            TransportConfig::default(),
        )
    }
}

impl Connector for HttpConnector {
    fn provider(&self, config: &ScanConfig) -> Result<Arc<dyn DnsProvider>, CoreError> {
        let token = config.api_token.as_ref().ok_or_else(|| {
            CoreError::config(format!(
                "organization '{}' has no API credential configured",
                config.org_id
            ))
        })?;
        self.provider_for_token(token)
    }

    fn provider_for_token(&self, token: &SecretString) -> Result<Arc<dyn DnsProvider>, CoreError> {
        let client = ProviderClient::from_token(&self.provider_url, token, &self.transport)?;
        Ok(Arc::new(client))
    }

    fn prober(&self, proxy: Option<&Url>) -> Result<Arc<dyn Prober>, CoreError> {
        let client = ProbeClient::new(proxy.cloned())?;
        Ok(Arc::new(HttpProber::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrgId;

    #[test]
    fn missing_credential_is_config_error() {
        let connector = HttpConnector::default();
        let config = ScanConfig::new(OrgId::from("acme"));
        let result = connector.provider(&config);
        assert!(matches!(result, Err(CoreError::Config { .. })));
    }

    #[test]
    fn builds_clients_with_credential_and_proxy() {
        let connector = HttpConnector::default();
        let config = ScanConfig::new(OrgId::from("acme"))
            .with_token(SecretString::from("token-123"));
        assert!(connector.provider(&config).is_ok());

        let proxy = Url::parse("http://proxy.internal:3128").ok();
        assert!(connector.prober(proxy.as_ref()).is_ok());
    }
}
