// ── Domain model ──
//
// Provider-agnostic entities the scanner reads and writes. API wire types
// are translated into these in `convert`.

mod exposure;
mod org_id;
mod record;
mod scan_log;
mod zone;

pub use exposure::{ExposureStatus, OriginExposureType, classify};
pub use org_id::OrgId;
pub use record::{DnsRecord, RecordSync, RecordType};
pub use scan_log::{ScanCounters, ScanLog, ScanStatus, ScanTrigger};
pub use zone::Zone;
