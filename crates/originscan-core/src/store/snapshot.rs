// ── JSON snapshots ──
//
// The on-disk form shared by CLI invocations: zones, records and scan
// history. Scan configurations are not written: credentials live in the
// config file or the OS keyring.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{DnsRecord, ScanLog, Zone};

#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct Snapshot {
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub records: Vec<DnsRecord>,
    #[serde(default)]
    pub scan_logs: Vec<ScanLog>,
}

impl Snapshot {
    /// Read `path`, or an empty snapshot when it does not exist.
    pub fn read(path: &Path) -> Result<Self, CoreError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no snapshot, starting empty");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(CoreError::store(format!("cannot read {}: {e}", path.display())));
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::store(format!("corrupt snapshot {}: {e}", path.display())))
    }

    /// Write as pretty JSON through a temporary file and a rename, so a
    /// reader never sees a partial snapshot.
    pub fn write(&self, path: &Path) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::store(format!("cannot encode snapshot: {e}")))?;
        write_replacing(path, &json)?;
        debug!(path = %path.display(), records = self.records.len(), "snapshot saved");
        Ok(())
    }
}

/// Replace `path` atomically, creating parent directories as needed.
pub(super) fn write_replacing(path: &Path, contents: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CoreError::store(format!("cannot create {}: {e}", parent.display())))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, contents)
        .map_err(|e| CoreError::store(format!("cannot write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| CoreError::store(format!("cannot replace {}: {e}", path.display())))
}

/// Sibling scratch file, unique per process.
pub(super) fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
