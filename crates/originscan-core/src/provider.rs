// ── DNS provider seam ──
//
// The orchestrator talks to the provider through this trait so tests
// can substitute canned zone/record data.

use async_trait::async_trait;

use originscan_api::ProviderClient;
use originscan_api::provider_types::{DnsRecordResponse, ZoneResponse};

use crate::error::CoreError;

#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Every zone visible to the credential, all pages concatenated.
    async fn list_zones(&self) -> Result<Vec<ZoneResponse>, CoreError>;

    /// A/AAAA/CNAME records for a zone. Per-type failures are skipped.
    async fn list_filtered_records(&self, zone_id: &str) -> Vec<DnsRecordResponse>;

    /// Never errors; any failure is `false`.
    async fn verify_credential(&self) -> bool;
}

#[async_trait]
impl DnsProvider for ProviderClient {
    async fn list_zones(&self) -> Result<Vec<ZoneResponse>, CoreError> {
        Ok(ProviderClient::list_zones(self).await?)
    }

    async fn list_filtered_records(&self, zone_id: &str) -> Vec<DnsRecordResponse> {
        ProviderClient::list_filtered_records(self, zone_id).await
    }

    async fn verify_credential(&self) -> bool {
        ProviderClient::verify_credential(self).await
    }
}
