use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::*;
use crate::crawl::FetchPolicy;

pub const DEFAULT_MAX_DEPTH: i64 = 4;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub fetch_backend: FetchBackend,
    pub table_path: Option<String>,
    pub max_depth: i64,
    pub fetch_timeout_ms: Option<u64>,
    pub fetch_retry_attempts: u32,
    pub fetch_retry_delay_ms: u64,
    pub latency_ms: u64,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
}

impl RuntimeConfig {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: self.fetch_timeout(),
            retry_attempts: self.fetch_retry_attempts,
            retry_delay: Duration::from_millis(self.fetch_retry_delay_ms),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub fetch_backend: Option<FetchBackend>,
    pub table_path: Option<String>,
    pub max_depth: Option<i64>,
    pub fetch_timeout_ms: Option<u64>,
    pub fetch_retry_attempts: Option<u32>,
    pub fetch_retry_delay_ms: Option<u64>,
    pub latency_ms: Option<u64>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check fetch_backend values and field names.",
            path.display()
        )
    })
}

fn select_profile(cli: &Cli, profiles: &ProfilesFile) -> Result<ProfileConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    if selected == "default" && !profiles.profiles.contains_key("default") {
        return Ok(ProfileConfig::default());
    }

    profiles.profiles.get(selected).cloned().ok_or_else(|| {
        let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
        names.sort();
        if names.is_empty() {
            anyhow::anyhow!(
                "profile '{}' not found in '{}'. No profiles are defined yet.",
                selected,
                cli.config_path
            )
        } else {
            anyhow::anyhow!(
                "profile '{}' not found in '{}'. Available profiles: {}",
                selected,
                cli.config_path,
                names.join(", ")
            )
        }
    })
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let profile = select_profile(cli, profiles)?;

    Ok(RuntimeConfig {
        profile: cli.profile.trim().to_string(),
        config_path: cli.config_path.clone(),
        fetch_backend: cli
            .fetch_backend
            .or(profile.fetch_backend)
            .unwrap_or(FetchBackend::Sample),
        table_path: cli.table_path.clone().or(profile.table_path),
        max_depth: profile.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        fetch_timeout_ms: cli
            .fetch_timeout_ms
            .or(profile.fetch_timeout_ms)
            .filter(|ms| *ms > 0),
        fetch_retry_attempts: cli
            .fetch_retry_attempts
            .or(profile.fetch_retry_attempts)
            .unwrap_or(1)
            .max(1),
        fetch_retry_delay_ms: cli
            .fetch_retry_delay_ms
            .or(profile.fetch_retry_delay_ms)
            .unwrap_or(0),
        latency_ms: cli.latency_ms.or(profile.latency_ms).unwrap_or(0),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(false),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".linkwalk/telemetry/events.jsonl".to_string()),
    })
}
