// src/config/models.rs
use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Number of cycle reports kept in memory.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Upper bound on probes running at once. Defaults to one slot per check.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Per-subscriber report queue length before the oldest report is dropped.
    #[serde(default = "default_sink_buffer")]
    pub sink_buffer: usize,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.interval_secs == 0 {
            return Err(MonitorError::config("interval_secs must be greater than zero"));
        }
        if self.history_size == 0 {
            return Err(MonitorError::config("history_size must be greater than zero"));
        }
        if self.sink_buffer == 0 {
            return Err(MonitorError::config("sink_buffer must be greater than zero"));
        }
        if self.max_concurrency == Some(0) {
            return Err(MonitorError::config("max_concurrency must be greater than zero"));
        }

        let mut seen = HashSet::new();
        for check in &self.checks {
            check.validate()?;
            if !seen.insert(check.name.as_str()) {
                return Err(MonitorError::DuplicateName(check.name.clone()));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_true")]
    pub log_reports: bool,
    #[serde(default)]
    pub json_lines_path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            log_reports: true,
            json_lines_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    #[serde(default = "default_check_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    pub probe: ProbeConfig,
}

impl CheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), MonitorError> {
        if self.name.trim().is_empty() {
            return Err(MonitorError::config("check name must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(MonitorError::config(format!(
                "check '{}': timeout_secs must be greater than zero",
                self.name
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(MonitorError::config(format!(
                "check '{}': retry.max_attempts must be at least 1",
                self.name
            )));
        }
        if let ProbeConfig::Command { program, .. } = &self.probe {
            if program.trim().is_empty() {
                return Err(MonitorError::config(format!(
                    "check '{}': command program must not be empty",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// Run an external program; a zero exit status is a pass.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// GET an endpoint; any 2xx (or exactly `expected_status`) is a pass.
    Http {
        url: Url,
        #[serde(default)]
        expected_status: Option<u16>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_history_size() -> usize {
    100
}

fn default_sink_buffer() -> usize {
    32
}

fn default_metrics_port() -> u16 {
    9100
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_true() -> bool {
    true
}

fn default_check_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_backoff_max_ms() -> u64 {
    5_000
}
