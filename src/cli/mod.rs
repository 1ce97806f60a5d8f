pub mod commands;

use crate::config::Config;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "containerd-gpu-exporter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Prometheus exporter for per-container GPU usage on containerd nodes", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        env = "GPU_EXPORTER_CONFIG",
        help = "YAML configuration file"
    )]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Serve metrics over HTTP (default)")]
    Serve,
    #[command(about = "Run a single scrape and print the result")]
    Collect {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Prometheus)]
        format: OutputFormat,
    },
    #[command(about = "Check that crictl and nvidia-smi can be invoked")]
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Prometheus,
    Json,
}

/// Settings that override the configuration file
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    #[arg(long, global = true, env = "GPU_EXPORTER_LISTEN_ADDRESS")]
    pub listen_address: Option<IpAddr>,

    #[arg(short, long, global = true, env = "GPU_EXPORTER_PORT")]
    pub port: Option<u16>,

    #[arg(long, global = true, env = "GPU_EXPORTER_MIN_SCRAPE_INTERVAL_MS")]
    pub min_scrape_interval_ms: Option<u64>,

    #[arg(long, global = true, env = "GPU_EXPORTER_SCRAPE_TIMEOUT_SECS")]
    pub scrape_timeout_secs: Option<u64>,

    #[arg(long, global = true, env = "GPU_EXPORTER_COMMAND_TIMEOUT_SECS")]
    pub command_timeout_secs: Option<u64>,

    #[arg(long, global = true, env = "GPU_EXPORTER_CONCURRENCY")]
    pub concurrency: Option<usize>,

    #[arg(long, global = true, env = "GPU_EXPORTER_CRICTL")]
    pub crictl_path: Option<String>,

    #[arg(long, global = true, env = "CONTAINER_RUNTIME_ENDPOINT")]
    pub runtime_endpoint: Option<String>,

    #[arg(long, global = true, env = "GPU_EXPORTER_NVIDIA_SMI")]
    pub nvidia_smi_path: Option<String>,

    #[arg(long, global = true, env = "GPU_EXPORTER_PROCESS_METRICS")]
    pub process_metrics: Option<bool>,
}

impl ConfigOverrides {
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(v) = self.listen_address {
            config.listen_address = v;
        }
        if let Some(v) = self.port {
            config.port = v;
        }
        if let Some(v) = self.min_scrape_interval_ms {
            config.min_scrape_interval_ms = v;
        }
        if let Some(v) = self.scrape_timeout_secs {
            config.scrape_timeout_secs = v;
        }
        if let Some(v) = self.command_timeout_secs {
            config.command_timeout_secs = v;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if let Some(v) = self.crictl_path {
            config.crictl_path = v;
        }
        if self.runtime_endpoint.is_some() {
            config.runtime_endpoint = self.runtime_endpoint;
        }
        if let Some(v) = self.nvidia_smi_path {
            config.nvidia_smi_path = v;
        }
        if let Some(v) = self.process_metrics {
            config.process_metrics = v;
        }
        config
    }
}
