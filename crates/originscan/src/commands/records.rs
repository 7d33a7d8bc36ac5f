//! DNS record command handlers.

use tabled::Tabled;

use originscan_core::{DnsRecord, ExposureStatus, OrgId, RecordFilter, RecordType};

use crate::cli::{RecordTypeArg, RecordsArgs, RecordsCommand, StatusArg};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Type")]
    record_type: String,
    #[tabled(rename = "Content")]
    content: String,
    #[tabled(rename = "Proxied")]
    proxied: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "HTTP")]
    http: String,
    #[tabled(rename = "Origin")]
    origin: String,
}

fn record_row(r: &DnsRecord, color: bool) -> RecordRow {
    RecordRow {
        id: r.provider_id.clone(),
        hostname: r.hostname.clone(),
        record_type: r.record_type.to_string(),
        content: r.content.clone(),
        proxied: if r.proxied { "yes".into() } else { "no".into() },
        status: output::exposure_status(r.exposure_status, color),
        http: r.http_status_code.map(|c| c.to_string()).unwrap_or_default(),
        origin: output::origin_state(r, color),
    }
}

pub(super) fn record_detail(r: &DnsRecord, color: bool) -> String {
    let mut pairs = vec![
        ("ID", r.provider_id.clone()),
        ("Hostname", r.hostname.clone()),
        ("Type", r.record_type.to_string()),
        ("Content", r.content.clone()),
        ("Proxied", r.proxied.to_string()),
        ("Zone", r.zone_id.clone()),
        ("Status", output::exposure_status(r.exposure_status, color)),
    ];
    if let Some(code) = r.http_status_code {
        pairs.push(("HTTP", code.to_string()));
    }
    if let Some(ms) = r.response_time_ms {
        pairs.push(("Response", format!("{ms} ms")));
    }
    if let Some(error) = &r.check_error {
        pairs.push(("Error", error.clone()));
    }
    pairs.push(("Checked", util::opt_timestamp(r.last_checked_at)));
    pairs.push(("Synced", util::timestamp(r.synced_at)));
    let origin = output::origin_state(r, color);
    if !origin.is_empty() {
        pairs.push(("Origin", origin));
    }
    if let Some(details) = &r.origin_exposure_details {
        pairs.push(("Details", details.clone()));
    }
    output::detail_lines(&pairs)
}

impl From<StatusArg> for ExposureStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Public => Self::Public,
            StatusArg::Private => Self::Private,
            StatusArg::Unreachable => Self::Unreachable,
            StatusArg::Error => Self::Error,
        }
    }
}

impl From<RecordTypeArg> for RecordType {
    fn from(arg: RecordTypeArg) -> Self {
        match arg {
            RecordTypeArg::A => Self::A,
            RecordTypeArg::Aaaa => Self::Aaaa,
            RecordTypeArg::Cname => Self::Cname,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: RecordsArgs) -> Result<(), CliError> {
    match args.command {
        RecordsCommand::List {
            org,
            status,
            record_type,
            exposed,
        } => {
            let org = OrgId::from(org.as_str());
            let filter = RecordFilter {
                status: status.map(Into::into),
                record_type: record_type.map(Into::into),
                exposed_only: exposed,
            };
            let records = ctx.service.records(&org, &filter).await?;

            let out = output::render_list(
                ctx.output,
                &records,
                |r| record_row(r, ctx.color),
                |r| r.hostname.clone(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        RecordsCommand::Get { org, record } => {
            let org = OrgId::from(org.as_str());
            let found = ctx.service.record(&org, &record).await?;

            let out = output::render_single(
                ctx.output,
                &found,
                |r| record_detail(r, ctx.color),
                |r| r.provider_id.clone(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
    }
}
