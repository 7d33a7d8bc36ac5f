mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use originscan_api::TransportConfig;
use originscan_core::{FileStore, HttpConnector, ScanService, ScanStore};

use crate::cli::{Cli, Command, GlobalOpts, OutputFormat};
use crate::commands::Context;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "originscan", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let ctx = build_context(&cli.global).await?;
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &ctx).await
        }
    }
}

/// Load config and scan state, then wire the scan service.
async fn build_context(global: &GlobalOpts) -> Result<Context, CliError> {
    let config_path = global
        .config
        .clone()
        .unwrap_or_else(originscan_config::config_path);
    let config = originscan_config::load_config_from(&config_path)?;

    let state_path = global.state.clone().unwrap_or_else(|| config.state_path());
    let store = Arc::new(FileStore::open(&state_path)?);
    for scan_config in config.scan_configs()? {
        store.save_scan_config(scan_config).await?;
    }

    let provider_url = global
        .provider_url
        .clone()
        .unwrap_or_else(|| config.defaults.provider_url.clone());
    let timeout = global
        .timeout
        .map_or_else(|| config.timeout(), std::time::Duration::from_secs);
    let connector = HttpConnector::new(provider_url, TransportConfig::default().with_timeout(timeout));
    let service = ScanService::new(store.clone(), Arc::new(connector));

    let output = match global.output {
        Some(format) => format,
        None => OutputFormat::from_str(&config.defaults.output, true).map_err(|_| {
            CliError::Validation {
                field: "defaults.output".into(),
                reason: format!("unknown output format '{}'", config.defaults.output),
            }
        })?,
    };

    Ok(Context {
        service,
        store,
        config,
        config_path,
        output,
        color: output::should_color(global.color),
        quiet: global.quiet,
        yes: global.yes,
    })
}
