//! Monitor configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Host name attached to structured log records
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// Seconds between the end of one tick and the start of the next
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Webhook endpoint for container stats; unset disables delivery
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,

    /// Render each report to stdout
    #[serde(default = "default_true")]
    pub console: bool,

    /// Sample containers through the Docker socket
    #[serde(default = "default_true")]
    pub containers: bool,

    /// API server port for health/metrics; 0 disables the server
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    /// Ticks a vanished interface or CPU keeps its last counters
    #[serde(default)]
    pub eviction_grace_ticks: u32,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_interval() -> u64 {
    1
}

fn default_webhook_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_api_port() -> u16 {
    8080
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

impl MonitorConfig {
    /// Load configuration from an optional `monitor` file and `MONITOR_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Same as [`MonitorConfig::load`], with the environment replaced by `env` when given
    pub fn load_from(env: Option<HashMap<String, String>>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("monitor").required(false))
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read configuration")?;

        let config: MonitorConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("MONITOR_INTERVAL_SECS must be greater than zero");
        }
        if self.webhook_timeout_secs == 0 {
            bail!("MONITOR_WEBHOOK_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}
