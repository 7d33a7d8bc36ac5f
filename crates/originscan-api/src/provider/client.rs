// Async HTTP client for the Cloudflare v4-compatible provider API.
//
// Base path: /client/v4/
// Auth: Authorization: Bearer <token>

use std::future::Future;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::types::{
    self, DnsRecordResponse, Envelope, FILTERED_RECORD_TYPES, Page, TokenVerifyResponse,
    ZoneResponse,
};
use crate::Error;
use crate::transport::TransportConfig;

/// Public Cloudflare API root.
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4/";

/// Page size for zone and record listings (provider maximum for records).
pub const DEFAULT_PER_PAGE: u32 = 100;

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the provider's zone and DNS record endpoints.
///
/// One instance per credential: the bearer token is baked into the
/// default headers, so clients are never shared across organizations.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: Url,
    per_page: u32,
}

impl ProviderClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an API token and transport config.
    ///
    /// Injects `Authorization: Bearer …` as a default header on every request.
    pub fn from_token(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())).map_err(|e| {
                Error::Authentication {
                    message: format!("invalid API token header value: {e}"),
                }
            })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self {
            http,
            base_url,
            per_page: DEFAULT_PER_PAGE,
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            per_page: DEFAULT_PER_PAGE,
        })
    }

    /// Override the page size used by the list helpers.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Ensure the base path ends with `/` so relative joins append.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Envelope<T>, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        self.handle_response(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<Envelope<T>, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(Error::RateLimited { retry_after_secs });
        }

        let body = resp.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .map(|env| env.error_summary())
                .unwrap_or_else(|_| status.to_string());
            return Err(Error::InvalidToken { message });
        }

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                let preview = body.chars().take(200).collect::<String>();
                return Err(Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                });
            }
            Err(_) => {
                return Err(Error::Provider {
                    status: status.as_u16(),
                    message: if body.is_empty() {
                        status.to_string()
                    } else {
                        body
                    },
                    code: None,
                });
            }
        };

        if !status.is_success() || !envelope.success {
            return Err(Error::Provider {
                status: status.as_u16(),
                message: envelope.error_summary(),
                code: envelope.first_error_code(),
            });
        }

        Ok(envelope)
    }

    fn into_page<T>(envelope: Envelope<Vec<T>>) -> Page<T> {
        Page {
            items: envelope.result.unwrap_or_default(),
            info: envelope.result_info,
        }
    }

    // ── Pagination helper ────────────────────────────────────────────

    /// Collect all pages into a single `Vec<T>`, starting at page 1.
    ///
    /// Stops at `total_pages` when the provider reports it, otherwise when a
    /// short page arrives or `total_count` is reached. Any page error aborts
    /// the whole listing.
    pub async fn paginate_all<T, F, Fut>(&self, per_page: u32, fetch: F) -> Result<Vec<T>, Error>
    where
        F: Fn(u32, u32) -> Fut,
        Fut: Future<Output = Result<Page<T>, Error>>,
    {
        let mut all = Vec::new();
        let mut page: u32 = 1;
        let per_page_usize = usize::try_from(per_page).unwrap_or(usize::MAX);

        loop {
            let batch = fetch(page, per_page).await?;
            let received = batch.items.len();
            all.extend(batch.items);

            let done = match batch.info {
                Some(types::ResultInfo {
                    total_pages: Some(total_pages),
                    ..
                }) => page >= total_pages,
                Some(info) => {
                    received < per_page_usize
                        || u64::try_from(all.len()).unwrap_or(u64::MAX) >= info.total_count
                }
                None => true,
            };

            if done || received == 0 {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Zones ────────────────────────────────────────────────────────

    pub async fn list_zones_page(&self, page: u32, per_page: u32) -> Result<Page<ZoneResponse>, Error> {
        let envelope = self
            .get_with_params(
                "zones",
                &[("page", page.to_string()), ("per_page", per_page.to_string())],
            )
            .await?;
        Ok(Self::into_page(envelope))
    }

    /// Every zone visible to the token, all pages concatenated.
    pub async fn list_zones(&self) -> Result<Vec<ZoneResponse>, Error> {
        self.paginate_all(self.per_page, |page, per_page| {
            self.list_zones_page(page, per_page)
        })
        .await
    }

    // ── DNS records ──────────────────────────────────────────────────

    pub async fn list_dns_records_page(
        &self,
        zone_id: &str,
        record_type: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<DnsRecordResponse>, Error> {
        let envelope = self
            .get_with_params(
                &format!("zones/{zone_id}/dns_records"),
                &[
                    ("type", record_type.to_owned()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ],
            )
            .await?;
        Ok(Self::into_page(envelope))
    }

    /// All records of one type in a zone.
    pub async fn list_dns_records(
        &self,
        zone_id: &str,
        record_type: &str,
    ) -> Result<Vec<DnsRecordResponse>, Error> {
        self.paginate_all(self.per_page, |page, per_page| {
            self.list_dns_records_page(zone_id, record_type, page, per_page)
        })
        .await
    }

    /// All A, AAAA and CNAME records in a zone.
    ///
    /// One paginated fetch per type. A failing type is logged and skipped so
    /// the remaining types still come back.
    pub async fn list_filtered_records(&self, zone_id: &str) -> Vec<DnsRecordResponse> {
        let mut records = Vec::new();

        for record_type in FILTERED_RECORD_TYPES {
            match self.list_dns_records(zone_id, record_type).await {
                Ok(batch) => {
                    debug!(zone_id, record_type, count = batch.len(), "fetched DNS records");
                    records.extend(batch);
                }
                Err(e) => {
                    warn!(zone_id, record_type, error = %e, "DNS record fetch failed, skipping type");
                }
            }
        }

        records
    }

    // ── Token verification ───────────────────────────────────────────

    pub async fn verify_token(&self) -> Result<TokenVerifyResponse, Error> {
        let envelope = self.get::<TokenVerifyResponse>("user/tokens/verify").await?;
        envelope.result.ok_or_else(|| Error::Deserialization {
            message: "token verification returned no result".into(),
            body: String::new(),
        })
    }

    /// `true` only when the provider confirms an active token.
    ///
    /// Never errors: transport and auth failures resolve to `false`.
    pub async fn verify_credential(&self) -> bool {
        match self.verify_token().await {
            Ok(token) => token.is_active(),
            Err(e) => {
                debug!(error = %e, "credential verification failed");
                false
            }
        }
    }
}
