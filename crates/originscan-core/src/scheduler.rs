// ── Scheduled scans ──
//
// Walks every enabled organization and scans it unless a scan is
// already running. One organization failing never stops the others.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::{OrgId, ScanTrigger};
use crate::scan::ScanService;

/// Outcome of one pass over the enabled organizations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleReport {
    pub completed: Vec<OrgId>,
    /// Organizations that already had a running scan.
    pub skipped: Vec<OrgId>,
    /// Organizations whose scan failed, with the error text.
    pub failed: Vec<(OrgId, String)>,
}

impl ScheduleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl ScanService {
    /// Scan every enabled organization once.
    ///
    /// Only a failure to list organizations is returned as an error;
    /// per-organization failures are logged and collected.
    pub async fn run_scheduled_scans(&self) -> Result<ScheduleReport, CoreError> {
        let configs = self.store().enabled_scan_configs().await?;
        info!(organizations = configs.len(), "scheduled scan pass starting");

        let mut report = ScheduleReport::default();
        for config in configs {
            let org = config.org_id;
            match self.store().running_scan(&org).await {
                Ok(Some(running)) => {
                    info!(org = %org, scan_id = %running.id, "scan already running, skipping");
                    report.skipped.push(org);
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(org = %org, error = %e, "cannot check for a running scan");
                    report.failed.push((org, e.to_string()));
                    continue;
                }
            }

            match self.run_full_scan(&org, ScanTrigger::Scheduled).await {
                Ok(_) => report.completed.push(org),
                Err(CoreError::ScanInProgress { scan_id, .. }) => {
                    info!(org = %org, %scan_id, "scan started concurrently, skipping");
                    report.skipped.push(org);
                }
                Err(e) => {
                    warn!(org = %org, error = %e, "scheduled scan failed");
                    report.failed.push((org, e.to_string()));
                }
            }
        }

        info!(
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "scheduled scan pass finished"
        );
        Ok(report)
    }

    /// Run [`run_scheduled_scans`](Self::run_scheduled_scans) now and then
    /// every `period` until `cancel` fires.
    pub async fn run_periodic(&self, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.run_scheduled_scans().await {
                        warn!(error = %e, "scheduled scan pass failed");
                    }
                }
            }
        }
        info!("periodic scanning stopped");
    }
}
