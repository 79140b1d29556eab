//! Server configuration, parsed from the command line.

use crate::protocol::DEFAULT_MAX_VALUE_SIZE;
use crate::storage::ReaperConfig;
use clap::Parser;
use std::time::Duration;

/// verkv - an in-memory, versioned key-value cache
#[derive(Debug, Clone, Parser)]
#[command(name = "verkv", version, about, long_about = None)]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Run the background reaper that reclaims expired entries
    #[arg(long)]
    pub reaper: bool,

    /// Seconds between reaper sweeps
    #[arg(long, default_value_t = 3)]
    pub reaper_interval: u64,

    /// Largest accepted value, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_VALUE_SIZE)]
    pub max_value_size: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            reaper: false,
            reaper_interval: 3,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reaper settings, or None when the reaper is disabled.
    pub fn reaper_config(&self) -> Option<ReaperConfig> {
        self.reaper.then(|| ReaperConfig {
            interval: Duration::from_secs(self.reaper_interval),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reaper && self.reaper_interval == 0 {
            anyhow::bail!("--reaper-interval must be greater than zero");
        }
        if self.max_value_size == 0 {
            anyhow::bail!("--max-value-size must be greater than zero");
        }
        Ok(())
    }
}
