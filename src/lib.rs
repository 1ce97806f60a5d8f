pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod gpu;
pub mod metrics;
pub mod parser;
pub mod runtime;

pub use error::{ExporterError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
