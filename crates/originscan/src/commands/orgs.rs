//! Organization command handlers.
//!
//! `set` verifies a new token through the scan service before the config
//! file or keyring is touched, so a rejected token leaves nothing behind.

use std::io::BufRead;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use originscan_config::{SystemKeyring, TokenSource, parse_proxy_url};
use originscan_core::{OrgId, ScanConfig, ScanConfigUpdate, ScanStatus};

use crate::cli::{OrgSetArgs, OrgsArgs, OrgsCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

// ── List view ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OrgSummary {
    org: String,
    enabled: bool,
    has_credential: bool,
    proxy_url: Option<String>,
    schedule: Option<String>,
    last_scan_status: Option<ScanStatus>,
    last_scan_at: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct OrgRow {
    #[tabled(rename = "Organization")]
    org: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Token")]
    token: String,
    #[tabled(rename = "Proxy")]
    proxy: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
    #[tabled(rename = "Last Scan")]
    last_scan: String,
}

fn org_row(s: &OrgSummary, color: bool) -> OrgRow {
    OrgRow {
        org: s.org.clone(),
        enabled: if s.enabled { "yes".into() } else { "no".into() },
        token: if s.has_credential { "set".into() } else { "missing".into() },
        proxy: s.proxy_url.clone().unwrap_or_default(),
        schedule: s.schedule.clone().unwrap_or_default(),
        last_scan: match (s.last_scan_status, s.last_scan_at) {
            (Some(status), Some(at)) => {
                format!("{} {}", output::scan_status(status, color), util::timestamp(at))
            }
            _ => "never".into(),
        },
    }
}

async fn summarize(ctx: &Context, config: ScanConfig) -> Result<OrgSummary, CliError> {
    let latest = ctx.service.latest_scan_log(&config.org_id).await?;
    Ok(OrgSummary {
        org: config.org_id.to_string(),
        enabled: config.enabled,
        has_credential: config.has_credential(),
        proxy_url: config.proxy_url.map(String::from),
        schedule: config.schedule,
        last_scan_status: latest.as_ref().map(|l| l.status),
        last_scan_at: latest.map(|l| l.started_at),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: OrgsArgs) -> Result<(), CliError> {
    match args.command {
        OrgsCommand::List => {
            let mut summaries = Vec::new();
            for config in ctx.service.organizations().await? {
                summaries.push(summarize(ctx, config).await?);
            }
            let out = output::render_list(
                ctx.output,
                &summaries,
                |s| org_row(s, ctx.color),
                |s| s.org.clone(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        OrgsCommand::Set(set) => handle_set(ctx, set).await,

        OrgsCommand::Verify { org } => {
            let org_id = OrgId::from(org.as_str());
            if !ctx.service.verify_organization(&org_id).await? {
                return Err(CliError::InvalidCredential { org });
            }
            ctx.note(format!("Token for '{org}' is valid"));
            Ok(())
        }

        OrgsCommand::Remove { org } => {
            if !util::confirm(
                &format!("Remove organization '{org}' and all of its scan data?"),
                ctx.yes,
                "orgs remove",
            )? {
                return Ok(());
            }

            ctx.service.remove_organization(&OrgId::from(org.as_str())).await?;

            let mut cfg = ctx.config.clone();
            if cfg.organizations.remove(&org).is_some() {
                originscan_config::save_config_to(&cfg, &ctx.config_path)?;
            }
            if let Err(e) = originscan_config::delete_api_token(&org) {
                tracing::warn!(org = %org, error = %e, "could not remove keyring token");
            }
            ctx.persist()?;
            ctx.note(format!("Organization '{org}' removed"));
            Ok(())
        }
    }
}

async fn handle_set(ctx: &Context, set: OrgSetArgs) -> Result<(), CliError> {
    let org_id = OrgId::from(set.org.as_str());
    let mut profile = ctx
        .config
        .organizations
        .get(&set.org)
        .cloned()
        .unwrap_or_default();

    let token = read_token(&set)?;

    let proxy_url = if set.no_proxy {
        Some(None)
    } else {
        set.proxy
            .as_deref()
            .map(parse_proxy_url)
            .transpose()?
            .map(Some)
    };
    let schedule = set
        .schedule
        .clone()
        .map(|s| if s.trim().is_empty() { None } else { Some(s) });
    let enabled = match (set.enable, set.disable) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };

    let update = ScanConfigUpdate {
        api_token: token.clone(),
        proxy_url: proxy_url.clone(),
        schedule: schedule.clone(),
        enabled,
    };
    let config = ctx.service.configure(&org_id, update).await?;

    // Verified; now record it.
    let source = match (&set.token_env, token) {
        (Some(env_name), _) => Some(TokenSource::Env(env_name.clone())),
        (None, Some(token)) if set.plaintext => Some(TokenSource::Plaintext(token)),
        (None, Some(token)) => Some(TokenSource::Keyring(token)),
        (None, None) => None,
    };
    if let Some(source) = &source {
        originscan_config::record_api_token(&mut profile, &set.org, source, &SystemKeyring)?;
    }
    if let Some(proxy) = proxy_url {
        profile.proxy_url = proxy.map(String::from);
    }
    if let Some(schedule) = schedule {
        profile.schedule = schedule;
    }
    profile.enabled = config.enabled;

    let mut cfg = ctx.config.clone();
    cfg.organizations.insert(set.org.clone(), profile);
    originscan_config::save_config_to(&cfg, &ctx.config_path)?;

    ctx.note(format!(
        "Organization '{}' saved ({})",
        set.org,
        if config.enabled { "enabled" } else { "disabled" }
    ));
    Ok(())
}

/// The token this invocation supplies, if any.
fn read_token(set: &OrgSetArgs) -> Result<Option<SecretString>, CliError> {
    let raw = if let Some(env_name) = &set.token_env {
        std::env::var(env_name).map_err(|_| CliError::Validation {
            field: "token-env".into(),
            reason: format!("environment variable {env_name} is not set"),
        })?
    } else if set.prompt_token {
        rpassword::prompt_password("API token: ").map_err(util::prompt_err)?
    } else if set.token_stdin {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line
    } else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::Validation {
            field: "api_token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(Some(SecretString::from(trimmed.to_owned())))
}
