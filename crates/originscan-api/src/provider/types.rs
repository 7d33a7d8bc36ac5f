//! Wire types for the Cloudflare v4-compatible provider API.
//!
//! Every response is wrapped in the `{ success, errors, messages, result,
//! result_info }` envelope. Field names are snake_case on the wire.

use serde::{Deserialize, Serialize};

// ── Envelope ─────────────────────────────────────────────────────────

/// A single entry of the envelope's `errors` / `messages` arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Response envelope shared by all endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    pub result: Option<T>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

impl<T> Envelope<T> {
    /// Join all envelope error messages into one line.
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "provider reported failure without details".into();
        }
        self.errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("[{code}] {}", e.message),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn first_error_code(&self) -> Option<i64> {
        self.errors.iter().find_map(|e| e.code)
    }
}

// ── Pagination ───────────────────────────────────────────────────────

/// Page metadata returned with list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultInfo {
    pub page: u32,
    pub per_page: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub info: Option<ResultInfo>,
}

// ── Zones ────────────────────────────────────────────────────────────

/// Zone overview, from `GET /zones`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneResponse {
    pub id: String,
    pub name: String,
    /// One of: `active`, `pending`, `initializing`, `moved`, `deleted`, `deactivated`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub name_servers: Vec<String>,
    #[serde(default)]
    pub paused: bool,
}

// ── DNS records ──────────────────────────────────────────────────────

/// Record types the scanner requests, one paginated fetch each.
pub const FILTERED_RECORD_TYPES: [&str; 3] = ["A", "AAAA", "CNAME"];

/// DNS record, from `GET /zones/{zoneId}/dns_records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecordResponse {
    pub id: String,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub zone_name: Option<String>,
    /// Fully-qualified hostname.
    pub name: String,
    /// `A`, `AAAA`, `CNAME`, ...
    #[serde(rename = "type")]
    pub record_type: String,
    /// Target IP for A/AAAA, target hostname for CNAME.
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default)]
    pub proxiable: bool,
    #[serde(default)]
    pub ttl: Option<u32>,
}

// ── Token verification ───────────────────────────────────────────────

/// Token status, from `GET /user/tokens/verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenVerifyResponse {
    pub id: String,
    /// `active`, `disabled` or `expired`.
    pub status: String,
    #[serde(default)]
    pub expires_on: Option<String>,
}

impl TokenVerifyResponse {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}
