//! Configuration for the telemetry listeners.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use crate::allocations::AllocationLevel;
use crate::collections::DEFAULT_CAPACITY;
use crate::error::{TelemetryError, TelemetryResult};
use crate::session::{EventLevel, FilterConfig, Keywords, RUNTIME_PROVIDER};

/// Command-line arguments. Each override also reads a `GCWATCH_*` variable.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Watches a runtime's collection events")]
pub struct CliArgs {
    /// JSON configuration file.
    #[arg(long, value_name = "PATH", env = "GCWATCH_CONFIG")]
    pub config: Option<PathBuf>,
    /// Diagnostics endpoint override (`host:port`).
    #[arg(long, value_name = "ADDR", env = "GCWATCH_ENDPOINT")]
    pub endpoint: Option<String>,
    /// Collections kept in history; `0` keeps everything.
    #[arg(long, value_name = "COUNT", env = "GCWATCH_HISTORY_CAPACITY")]
    pub history_capacity: Option<usize>,
    /// Allocation sampling level: none, some, most or all.
    #[arg(long, value_name = "LEVEL", env = "GCWATCH_ALLOCATION_LEVEL")]
    pub allocation_level: Option<AllocationLevel>,
    /// Report cadence override.
    #[arg(long, value_name = "MS", env = "GCWATCH_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// `host:port` of the diagnostics endpoint.
    pub endpoint: String,
    pub provider: String,
    pub verbosity: EventLevel,
    /// Collections kept in history; `0` keeps everything.
    pub history_capacity: usize,
    pub allocation_level: AllocationLevel,
    pub watcher_backoff_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:9321".to_string(),
            provider: RUNTIME_PROVIDER.to_string(),
            verbosity: EventLevel::Informational,
            history_capacity: DEFAULT_CAPACITY,
            allocation_level: AllocationLevel::Some,
            watcher_backoff_ms: 1,
            poll_interval_ms: 1000,
        }
    }
}

impl TelemetryConfig {
    /// Reads the file named by `cli`, if any, and merges the flags over it.
    pub fn load(cli: &CliArgs) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_json(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.merge_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> TelemetryResult<Self> {
        serde_json::from_str(raw).map_err(|e| TelemetryError::Config(e.to_string()))
    }

    /// Flags and their environment variables win over the file.
    pub fn merge_cli(&mut self, cli: &CliArgs) {
        if let Some(endpoint) = &cli.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(capacity) = cli.history_capacity {
            self.history_capacity = capacity;
        }
        if let Some(level) = cli.allocation_level {
            self.allocation_level = level;
        }
        if let Some(interval) = cli.poll_interval_ms {
            self.poll_interval_ms = interval;
        }
    }

    pub fn validate(&self) -> TelemetryResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(TelemetryError::Config("endpoint must not be empty".to_string()));
        }
        if self.provider.trim().is_empty() {
            return Err(TelemetryError::Config("provider must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn collections_filter(&self) -> FilterConfig {
        FilterConfig::new(self.provider.clone(), self.verbosity, Keywords::COLLECTIONS_ONLY)
    }

    pub fn allocations_filter(&self) -> FilterConfig {
        FilterConfig::new(
            self.provider.clone(),
            self.verbosity,
            self.allocation_level.keywords(),
        )
    }

    pub fn watcher_backoff(&self) -> Duration {
        Duration::from_millis(self.watcher_backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
