// originscan-core: Scan orchestration between originscan-api and consumers (CLI).

pub mod config;
pub mod connector;
pub mod convert;
pub mod correlate;
pub mod error;
pub mod model;
pub mod probe;
pub mod provider;
pub mod scan;
pub mod scheduler;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ScanConfig, ScanConfigUpdate};
pub use connector::{Connector, HttpConnector};
pub use correlate::{Correlation, correlate};
pub use error::CoreError;
pub use probe::{HttpProber, ProbeResult, Prober};
pub use provider::DnsProvider;
pub use scan::{RecordFilter, ScanService, DEFAULT_BATCH_SIZE};
pub use scheduler::ScheduleReport;
pub use store::{DEFAULT_LEASE_TTL, FileStore, MemoryStore, ScanStore};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    DnsRecord, ExposureStatus, OrgId, OriginExposureType, RecordSync, RecordType, ScanCounters,
    ScanLog, ScanStatus, ScanTrigger, Zone, classify,
};
