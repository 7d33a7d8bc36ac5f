//! Clap derive structures for the `originscan` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// originscan -- find DNS records that leak the origin behind your CDN
#[derive(Debug, Parser)]
#[command(
    name = "originscan",
    version,
    about = "Scan DNS zones for public hosts and exposed CDN origins",
    long_about = "Discovers an organization's DNS records through the provider API,\n\
        probes every hostname over HTTPS, and flags proxied hosts whose origin\n\
        IP is published by an unproxied record.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "ORIGINSCAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Scan state snapshot file
    #[arg(long, env = "ORIGINSCAN_STATE", global = true)]
    pub state: Option<PathBuf>,

    /// Provider API root (overrides config)
    #[arg(long, env = "ORIGINSCAN_PROVIDER_URL", global = true)]
    pub provider_url: Option<String>,

    /// Output format (defaults to the config value, else table)
    #[arg(long, short = 'o', env = "ORIGINSCAN_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Provider request timeout in seconds (overrides config)
    #[arg(long, env = "ORIGINSCAN_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run scans and inspect scan history
    #[command(alias = "s")]
    Scan(ScanArgs),

    /// Inspect scanned DNS records
    #[command(alias = "rec", alias = "r")]
    Records(RecordsArgs),

    /// Inspect synced DNS zones
    #[command(alias = "z")]
    Zones(ZonesArgs),

    /// Manage organizations and their provider credentials
    #[command(alias = "org")]
    Orgs(OrgsArgs),

    /// Scan every enabled organization on an interval until interrupted
    Daemon(DaemonArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SCAN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(subcommand)]
    pub command: ScanCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScanCommand {
    /// Run a full scan for one organization
    Run {
        /// Organization id
        org: String,

        /// User id recorded as the scan trigger
        #[arg(long, env = "USER", default_value = "cli")]
        user: String,
    },

    /// Re-probe a single DNS record
    Check {
        /// Organization id
        org: String,

        /// Provider record id
        record: String,
    },

    /// Scan every enabled organization once
    All,

    /// List past scans of an organization
    #[command(alias = "history")]
    Logs {
        /// Organization id
        org: String,

        /// Show at most this many scans
        #[arg(long, short = 'l', default_value = "20")]
        limit: usize,
    },

    /// Show one scan by id
    Show {
        /// Scan id (UUID)
        scan_id: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RECORDS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RecordsArgs {
    #[command(subcommand)]
    pub command: RecordsCommand,
}

#[derive(Debug, Subcommand)]
pub enum RecordsCommand {
    /// List DNS records with their latest scan results
    #[command(alias = "ls")]
    List {
        /// Organization id
        org: String,

        /// Only records with this reachability status
        #[arg(long, short = 's')]
        status: Option<StatusArg>,

        /// Only records of this type
        #[arg(long = "type", short = 't')]
        record_type: Option<RecordTypeArg>,

        /// Only records whose origin is exposed
        #[arg(long, short = 'e')]
        exposed: bool,
    },

    /// Show one DNS record
    Get {
        /// Organization id
        org: String,

        /// Provider record id
        record: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Public,
    Private,
    Unreachable,
    Error,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RecordTypeArg {
    A,
    Aaaa,
    Cname,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ZONES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ZonesArgs {
    #[command(subcommand)]
    pub command: ZonesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ZonesCommand {
    /// List zones synced for an organization
    #[command(alias = "ls")]
    List {
        /// Organization id
        org: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ORGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct OrgsArgs {
    #[command(subcommand)]
    pub command: OrgsCommand,
}

#[derive(Debug, Subcommand)]
pub enum OrgsCommand {
    /// List configured organizations
    #[command(alias = "ls")]
    List,

    /// Create or update an organization
    ///
    /// A new API token is verified against the provider before anything
    /// is written.
    Set(OrgSetArgs),

    /// Check an organization's API token against the provider
    Verify {
        /// Organization id
        org: String,
    },

    /// Remove an organization and its scan data
    #[command(alias = "rm")]
    Remove {
        /// Organization id
        org: String,
    },
}

#[derive(Debug, Args)]
pub struct OrgSetArgs {
    /// Organization id
    pub org: String,

    /// Read the API token from this environment variable at scan time
    #[arg(long, conflicts_with_all = ["prompt_token", "token_stdin"])]
    pub token_env: Option<String>,

    /// Prompt for the API token (hidden input)
    #[arg(long, conflicts_with = "token_stdin")]
    pub prompt_token: bool,

    /// Read the API token from the first line of stdin
    #[arg(long)]
    pub token_stdin: bool,

    /// Store a prompted/stdin token in the config file instead of the keyring
    #[arg(long)]
    pub plaintext: bool,

    /// HTTP/HTTPS forward proxy for outbound probes
    #[arg(long, conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Remove the configured proxy
    #[arg(long)]
    pub no_proxy: bool,

    /// Schedule expression (e.g. "0 */6 * * *")
    #[arg(long)]
    pub schedule: Option<String>,

    /// Include in scheduled scans
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    /// Exclude from scheduled scans
    #[arg(long)]
    pub disable: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DAEMON & COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DaemonArgs {
    /// Seconds between passes (overrides `defaults.scan_interval`)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
