//! Scan command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use originscan_core::{CoreError, OrgId, ScanLog, ScanTrigger, ScheduleReport};

use crate::cli::{OutputFormat, ScanArgs, ScanCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, records, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ScanRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Took")]
    took: String,
    #[tabled(rename = "Records")]
    records: String,
    #[tabled(rename = "Public")]
    public: usize,
    #[tabled(rename = "Exposed")]
    exposed: usize,
}

fn scan_row(log: &ScanLog, color: bool) -> ScanRow {
    ScanRow {
        id: log.id.to_string(),
        status: output::scan_status(log.status, color),
        trigger: log.triggered_by.to_string(),
        started: util::timestamp(log.started_at),
        took: log.duration().map(util::duration).unwrap_or_default(),
        records: format!("{}/{}", log.counters.checked, log.counters.records_total),
        public: log.counters.public,
        exposed: log.counters.origin_exposed,
    }
}

fn scan_detail(log: &ScanLog, color: bool) -> String {
    let c = &log.counters;
    let mut pairs = vec![
        ("ID", log.id.to_string()),
        ("Organization", log.org_id.to_string()),
        ("Status", output::scan_status(log.status, color)),
        ("Trigger", log.triggered_by.to_string()),
        ("Started", util::timestamp(log.started_at)),
        ("Completed", util::opt_timestamp(log.completed_at)),
        ("Zones", c.zones_scanned.to_string()),
        ("Records", format!("{} synced, {} total", c.records_scanned, c.records_total)),
        ("Checked", c.checked.to_string()),
        (
            "Results",
            format!(
                "{} public, {} private, {} unreachable, {} error",
                c.public, c.private, c.unreachable, c.error
            ),
        ),
        ("Exposed", c.origin_exposed.to_string()),
    ];
    if let Some(domain) = &log.current_domain {
        pairs.push(("Current", domain.clone()));
    }
    if let Some(error) = &log.error_message {
        pairs.push(("Error", error.clone()));
    }
    output::detail_lines(&pairs)
}

fn report_detail(report: &ScheduleReport) -> String {
    let join = |orgs: &[OrgId]| {
        orgs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    };
    let mut pairs = vec![
        ("Completed", join(report.completed.as_slice())),
        ("Skipped", join(report.skipped.as_slice())),
    ];
    for (org, reason) in &report.failed {
        pairs.push(("Failed", format!("{org}: {reason}")));
    }
    output::detail_lines(&pairs)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: ScanArgs) -> Result<(), CliError> {
    match args.command {
        ScanCommand::Run { org, user } => {
            let org = OrgId::from(org.as_str());
            let result = run_with_progress(ctx, &org, ScanTrigger::User(user)).await;
            // Failed scans keep their partial results and log.
            ctx.persist()?;
            let log = result?;

            let out = output::render_single(
                ctx.output,
                &log,
                |l| scan_detail(l, ctx.color),
                |l| l.id.to_string(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        ScanCommand::Check { org, record } => {
            let org = OrgId::from(org.as_str());
            let checked = ctx.service.check_single_record(&record, &org).await?;
            ctx.persist()?;

            let out = output::render_single(
                ctx.output,
                &checked,
                |r| records::record_detail(r, ctx.color),
                |r| r.exposure_status.to_string(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        ScanCommand::All => {
            let report = ctx.service.run_scheduled_scans().await;
            ctx.persist()?;
            let report = report?;

            let out = output::render_single(ctx.output, &report, report_detail, |r| {
                r.completed
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            output::print_output(&out, ctx.quiet);

            if report.failed.is_empty() {
                Ok(())
            } else {
                Err(CliError::ScansFailed {
                    failed: report.failed.len(),
                    total: report.completed.len() + report.failed.len(),
                })
            }
        }

        ScanCommand::Logs { org, limit } => {
            let org = OrgId::from(org.as_str());
            let mut logs = ctx.service.scan_logs(&org).await?;
            logs.truncate(limit);

            let out = output::render_list(
                ctx.output,
                &logs,
                |l| scan_row(l, ctx.color),
                |l| l.id.to_string(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        ScanCommand::Show { scan_id } => {
            let id: uuid::Uuid = scan_id.parse().map_err(|_| CliError::Validation {
                field: "scan_id".into(),
                reason: format!("'{scan_id}' is not a UUID"),
            })?;
            let log = ctx.service.scan_log(id).await?;

            let out = output::render_single(
                ctx.output,
                &log,
                |l| scan_detail(l, ctx.color),
                |l| l.status.to_string(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
    }
}

/// Run a scan, mirroring its progress log on a stderr spinner.
async fn run_with_progress(
    ctx: &Context,
    org: &OrgId,
    trigger: ScanTrigger,
) -> Result<ScanLog, CoreError> {
    let interactive =
        !ctx.quiet && ctx.output == OutputFormat::Table && std::io::stderr().is_terminal();
    if !interactive {
        return ctx.service.start_scan(org, trigger).await;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("scanning {org}"));

    let mut progress = ctx.service.subscribe_progress();
    let scan = ctx.service.start_scan(org, trigger);
    tokio::pin!(scan);

    let result = loop {
        tokio::select! {
            result = &mut scan => break result,
            Ok(()) = progress.changed() => {
                if let Some(log) = progress.borrow_and_update().as_ref() {
                    spinner.set_message(progress_message(log));
                }
            }
        }
    };
    spinner.finish_and_clear();
    result
}

fn progress_message(log: &ScanLog) -> String {
    let c = &log.counters;
    let mut msg = format!(
        "{}: {} zones, {}/{} records checked",
        log.org_id, c.zones_scanned, c.checked, c.records_total
    );
    if let Some(domain) = &log.current_domain {
        msg.push_str(&format!(" ({domain})"));
    }
    msg
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn progress_message_names_the_current_domain() {
        let mut log = ScanLog::start(OrgId::from("acme"), ScanTrigger::Scheduled);
        log.counters.zones_scanned = 2;
        log.counters.records_total = 10;
        log.counters.checked = 4;
        log.current_domain = Some("api.example.com".into());
        assert_eq!(
            progress_message(&log),
            "acme: 2 zones, 4/10 records checked (api.example.com)"
        );
    }

    #[test]
    fn failed_scan_detail_shows_the_error() {
        let mut log = ScanLog::start(OrgId::from("acme"), ScanTrigger::Scheduled);
        log.fail("zone listing failed");
        let detail = scan_detail(&log, false);
        assert!(detail.contains("failed"));
        assert!(detail.contains("zone listing failed"));
    }
}
