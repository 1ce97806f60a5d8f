use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("{tool} could not be executed: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("{tool} did not finish within {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("{tool} exited with status {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Container {0} no longer exists")]
    ContainerVanished(String),

    #[error("Malformed {source_name} output: {detail}")]
    MalformedOutput { source_name: String, detail: String },

    #[error("Scrape did not complete within {0:?}")]
    ScrapeTimeout(Duration),

    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExporterError {
    pub fn malformed(source_name: &str, detail: impl Into<String>) -> Self {
        ExporterError::MalformedOutput {
            source_name: source_name.to_string(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
