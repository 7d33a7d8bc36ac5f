// originscan-api: Async Rust client for CDN/DNS provider APIs and HTTPS probing

pub mod error;
pub mod probe;
pub mod provider;
pub mod transport;

pub use error::Error;
pub use probe::{FailureKind, ProbeClient, ProbeFailure, RawProbe};
pub use provider::ProviderClient;
pub use provider::types as provider_types;
pub use transport::{TlsMode, TransportConfig};
