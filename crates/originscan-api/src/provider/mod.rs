// Provider API client for zone and DNS record discovery.
//
// Speaks the Cloudflare v4 wire format: bearer-token auth, JSON envelopes,
// page-based pagination.

pub mod client;
pub mod types;

pub use client::{DEFAULT_BASE_URL, DEFAULT_PER_PAGE, ProviderClient};
