use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "slice_demo.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub log_filter: String,
    pub pure_by_default: bool,
    pub event_capacity: usize,
    pub effect_timeout_ms: u64,
    pub remote_latency_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            pure_by_default: true,
            event_capacity: 256,
            effect_timeout_ms: 5_000,
            remote_latency_ms: 25,
        }
    }
}

impl Settings {
    pub fn effect_timeout(&self) -> Duration {
        Duration::from_millis(self.effect_timeout_ms)
    }

    pub fn remote_latency(&self) -> Duration {
        Duration::from_millis(self.remote_latency_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    log_filter: Option<String>,
    pure_by_default: Option<bool>,
    event_capacity: Option<usize>,
    effect_timeout_ms: Option<u64>,
    remote_latency_ms: Option<u64>,
}

/// Defaults, then the TOML file (explicit path, or `slice_demo.toml` if present), then `APP__*` env.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let file = match path {
        Some(path) => Some(read_file_settings(path)?),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                Some(read_file_settings(&fallback)?)
            } else {
                None
            }
        }
    };
    if let Some(file) = file {
        apply_file_settings(&mut settings, file);
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_file_settings(path: &Path) -> anyhow::Result<FileSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_file_settings(&raw)
        .with_context(|| format!("failed to parse config file '{}'", path.display()))
}

fn parse_file_settings(raw: &str) -> anyhow::Result<FileSettings> {
    Ok(toml::from_str(raw)?)
}

fn apply_file_settings(settings: &mut Settings, file: FileSettings) {
    if let Some(v) = file.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file.pure_by_default {
        settings.pure_by_default = v;
    }
    if let Some(v) = file.event_capacity {
        settings.event_capacity = v;
    }
    if let Some(v) = file.effect_timeout_ms {
        settings.effect_timeout_ms = v;
    }
    if let Some(v) = file.remote_latency_ms {
        settings.remote_latency_ms = v;
    }
}

/// Unparseable values are ignored and the previous value kept.
fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(v) = var("APP__PURE_BY_DEFAULT") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.pure_by_default = parsed;
        }
    }
    if let Some(v) = var("APP__EVENT_CAPACITY") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.event_capacity = parsed;
        }
    }
    if let Some(v) = var("APP__EFFECT_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.effect_timeout_ms = parsed;
        }
    }
    if let Some(v) = var("APP__REMOTE_LATENCY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.remote_latency_ms = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
