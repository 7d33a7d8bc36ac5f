//! Command dispatch: bridges CLI args -> scan service -> output formatting.

pub mod daemon;
pub mod orgs;
pub mod records;
pub mod scan;
pub mod util;
pub mod zones;

use std::path::PathBuf;
use std::sync::Arc;

use originscan_config::Config;
use originscan_core::{FileStore, ScanService};

use crate::cli::{Command, OutputFormat};
use crate::error::CliError;

/// Everything a handler needs, built once per invocation.
pub struct Context {
    pub service: ScanService,
    pub store: Arc<FileStore>,
    pub config: Config,
    pub config_path: PathBuf,
    pub output: OutputFormat,
    pub color: bool,
    pub quiet: bool,
    pub yes: bool,
}

impl Context {
    /// Merge this invocation's writes into the shared state snapshot.
    pub fn persist(&self) -> Result<(), CliError> {
        self.store.flush()?;
        Ok(())
    }

    /// Progress chatter on stderr, suppressed by `--quiet`.
    pub fn note(&self, message: impl std::fmt::Display) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }
}

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Scan(args) => scan::handle(ctx, args).await,
        Command::Records(args) => records::handle(ctx, args).await,
        Command::Zones(args) => zones::handle(ctx, args).await,
        Command::Orgs(args) => orgs::handle(ctx, args).await,
        Command::Daemon(args) => daemon::handle(ctx, args).await,
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before dispatch".into(),
        )),
    }
}
