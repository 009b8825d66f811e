use std::time::Duration;

use anyhow::Context;
use tracing::{trace, warn};

use crate::util::{TELEMETRY_INTERVAL_MS, TELEMETRY_STOP_TIMEOUT_MS, env_lookup};

pub const MIN_UPDATE_INTERVAL_MS: i32 = 100;

pub const DEFAULT_UPDATE_INTERVAL_MS: i32 = 1000;

pub const MAX_UPDATE_INTERVAL_MS: i32 = 3_600_000;

/// Upper bound on how long `Monitor::stop` waits for the worker to exit
pub const MAX_THREAD_WAIT_MS: u64 = 5000;

pub fn is_valid_interval(interval_ms: i32) -> bool {
    (MIN_UPDATE_INTERVAL_MS..=MAX_UPDATE_INTERVAL_MS).contains(&interval_ms)
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MonitorConfig {
    /// Sleep between two cycles, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: i32,

    /// Bounded wait for the worker to exit on stop, in milliseconds
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Output settings for the JSON document
    #[serde(default)]
    pub document: DocumentConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DocumentConfig {
    #[serde(default = "default_pretty_print")]
    pub pretty_print: bool,

    #[serde(default = "default_indent")]
    pub indent: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            document: DocumentConfig::default(),
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            pretty_print: default_pretty_print(),
            indent: default_indent(),
        }
    }
}

impl MonitorConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_valid_interval(self.interval_ms) {
            anyhow::bail!(
                "interval_ms must be within {MIN_UPDATE_INTERVAL_MS}..={MAX_UPDATE_INTERVAL_MS}, got {}",
                self.interval_ms
            );
        }
        if self.stop_timeout_ms == 0 {
            anyhow::bail!("stop_timeout_ms must be greater than 0");
        }
        Ok(())
    }

    /// Applies `TELEMETRY_*` environment overrides on top of this config.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(env_lookup)
    }

    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(TELEMETRY_INTERVAL_MS) {
            match raw.trim().parse::<i32>() {
                Ok(interval_ms) => self.interval_ms = interval_ms,
                Err(e) => warn!("ignoring {TELEMETRY_INTERVAL_MS}={raw:?}: {e}"),
            }
        }

        if let Some(raw) = lookup(TELEMETRY_STOP_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(timeout_ms) => self.stop_timeout_ms = timeout_ms,
                Err(e) => warn!("ignoring {TELEMETRY_STOP_TIMEOUT_MS}={raw:?}: {e}"),
            }
        }

        self
    }
}

fn default_interval_ms() -> i32 {
    DEFAULT_UPDATE_INTERVAL_MS
}

fn default_stop_timeout_ms() -> u64 {
    MAX_THREAD_WAIT_MS
}

fn default_pretty_print() -> bool {
    true
}

fn default_indent() -> usize {
    2
}

pub fn read_config_file(path: &str) -> anyhow::Result<MonitorConfig> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let config: MonitorConfig = serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
