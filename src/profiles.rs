use anyhow::Result;

use crate::config::{ProfilesFile, RuntimeConfig};

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();

    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in names {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    println!("Fetch backend: {}", cfg.fetch_backend.label());
    println!(
        "Table path: {}",
        cfg.table_path.as_deref().unwrap_or("<not configured>")
    );
    println!("Default max depth: {}", cfg.max_depth);
    println!(
        "Fetch timeout (ms): {}",
        cfg.fetch_timeout_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!("Fetch retry attempts: {}", cfg.fetch_retry_attempts);
    println!("Fetch retry delay (ms): {}", cfg.fetch_retry_delay_ms);
    println!("Simulated latency (ms): {}", cfg.latency_ms);
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
