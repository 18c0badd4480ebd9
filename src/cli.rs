use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    Sample,
    Table,
    Http,
}

impl FetchBackend {
    pub fn label(self) -> &'static str {
        match self {
            FetchBackend::Sample => "sample",
            FetchBackend::Table => "table",
            FetchBackend::Http => "http",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  linkwalk crawl http://golang.org/ --depth 4\n\
  linkwalk --fetch-backend table --table-path site.toml crawl http://example.test/ --depth 3\n\
  linkwalk --fetch-timeout-ms 2000 --fetch-retry-attempts 3 crawl http://golang.org/\n\
  linkwalk --latency-ms 250 crawl http://golang.org/\n\
  linkwalk --profile staging doctor\n\
  linkwalk profiles list\n\
  linkwalk telemetry report --limit 2000\n\
\n\
Behavior:\n\
  - Every identifier is fetched at most once per run; --depth 0 fetches nothing.\n\
  - Report lines go to stdout in arrival order; logs go to stderr (RUST_LOG).\n\
  - Ctrl-C stops dispatching new fetches and abandons in-flight ones.";

#[derive(Debug, Parser)]
#[command(name = "linkwalk")]
#[command(about = "Bounded-depth concurrent link crawler")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "LINKWALK_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "LINKWALK_CONFIG", default_value = ".linkwalk/config.toml")]
    pub config_path: String,

    #[arg(long, env = "LINKWALK_FETCH_BACKEND", value_enum)]
    pub fetch_backend: Option<FetchBackend>,

    #[arg(long, env = "LINKWALK_TABLE_PATH")]
    pub table_path: Option<String>,

    #[arg(long, env = "LINKWALK_FETCH_TIMEOUT_MS")]
    pub fetch_timeout_ms: Option<u64>,

    #[arg(long, env = "LINKWALK_FETCH_RETRY_ATTEMPTS")]
    pub fetch_retry_attempts: Option<u32>,

    #[arg(long, env = "LINKWALK_FETCH_RETRY_DELAY_MS")]
    pub fetch_retry_delay_ms: Option<u64>,

    #[arg(long, env = "LINKWALK_LATENCY_MS")]
    pub latency_ms: Option<u64>,

    #[arg(long, env = "LINKWALK_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "LINKWALK_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Crawl from a start identifier and print one line per fetched page")]
    Crawl {
        start: String,
        #[arg(long, allow_negative_numbers = true)]
        depth: Option<i64>,
    },
    #[command(about = "Validate fetch backend and print the resolved configuration")]
    Doctor,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Crawl { .. } => "crawl".to_string(),
        Commands::Doctor => "doctor".to_string(),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
