//! Exporter configuration
//!
//! Values come from (highest precedence first) command line flags,
//! environment variables, an optional YAML file, and the defaults below.

use crate::metrics::collector::{DEFAULT_CONCURRENCY, DEFAULT_SCRAPE_TIMEOUT};
use crate::{ExporterError, Result};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 9066;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub listen_address: IpAddr,
    pub port: u16,
    /// A successful scrape younger than this is served again
    pub min_scrape_interval_ms: u64,
    pub scrape_timeout_secs: u64,
    /// Timeout for a single crictl or nvidia-smi invocation
    pub command_timeout_secs: u64,
    /// Containers inspected and probed in parallel
    pub concurrency: usize,
    pub crictl_path: String,
    pub runtime_endpoint: Option<String>,
    pub nvidia_smi_path: String,
    pub process_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            min_scrape_interval_ms: 500,
            scrape_timeout_secs: DEFAULT_SCRAPE_TIMEOUT.as_secs(),
            command_timeout_secs: 5,
            concurrency: DEFAULT_CONCURRENCY,
            crictl_path: "crictl".to_string(),
            runtime_endpoint: None,
            nvidia_smi_path: "nvidia-smi".to_string(),
            process_metrics: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExporterError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            ExporterError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load `path` if given, otherwise start from the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ExporterError::ConfigError("port must not be 0".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ExporterError::ConfigError(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.scrape_timeout_secs == 0 || self.command_timeout_secs == 0 {
            return Err(ExporterError::ConfigError(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if self.command_timeout_secs > self.scrape_timeout_secs {
            return Err(ExporterError::ConfigError(format!(
                "command timeout ({}s) exceeds scrape timeout ({}s)",
                self.command_timeout_secs, self.scrape_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.port)
    }

    pub fn min_scrape_interval(&self) -> Duration {
        Duration::from_millis(self.min_scrape_interval_ms)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
