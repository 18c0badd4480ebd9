use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;

use linkwalk::cli::{Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use linkwalk::config::{load_profiles, resolve_runtime_config};
use linkwalk::doctor::run_doctor;
use linkwalk::error::{categorize_error, format_cli_error};
use linkwalk::profiles::{run_profiles_list, run_profiles_show};
use linkwalk::runner::run_crawl;
use linkwalk::telemetry::{TelemetrySink, run_telemetry_report};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %categorize_error(&err).code(), error = %err, "command failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let telemetry = TelemetrySink::new(&cfg, command_label(&cli.command));
    tracing::info!(
        profile = %cfg.profile,
        backend = cfg.fetch_backend.label(),
        "Resolved runtime configuration"
    );

    let result = match cli.command {
        Commands::Crawl { start, depth } => run_crawl(&cfg, &start, depth, &telemetry)
            .await
            .map(|_| ()),
        Commands::Doctor => run_doctor(&cfg),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => run_profiles_list(&profiles, &cfg),
            ProfileCommands::Show => run_profiles_show(&cfg),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { path, limit } => run_telemetry_report(&cfg, path, limit),
        },
    };

    if let Err(err) = &result {
        telemetry.emit(
            "command.failed",
            json!({ "category": categorize_error(err).code(), "error": format!("{err:#}") }),
        );
    }
    result
}

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
