use anyhow::Result;

use crate::cli::FetchBackend;
use crate::config::RuntimeConfig;
use crate::fetcher::{SAMPLE_START, build_fetcher};

pub fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    let web_fetch = cfg!(feature = "web-fetch");
    println!(
        "Build features: web-fetch={}",
        if web_fetch { "enabled" } else { "disabled" }
    );

    println!(
        "Fetch: backend={}, table_path={}, timeout_ms={}, retry_attempts={}, retry_delay_ms={}, latency_ms={}",
        cfg.fetch_backend.label(),
        cfg.table_path.as_deref().unwrap_or("<not configured>"),
        cfg.fetch_timeout_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "<none>".to_string()),
        cfg.fetch_retry_attempts,
        cfg.fetch_retry_delay_ms,
        cfg.latency_ms
    );
    println!("Default max depth: {}", cfg.max_depth);
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    let fetcher = build_fetcher(cfg)?;
    println!("Fetch backend check: ok ({})", fetcher.backend_name());

    if matches!(cfg.fetch_backend, FetchBackend::Sample) {
        println!("Tip: the sample backend starts at {SAMPLE_START}");
    }

    Ok(())
}
