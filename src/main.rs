use clap::Parser;
use containerd_gpu_exporter::cli::{commands, Cli, Commands};
use containerd_gpu_exporter::config::Config;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting containerd-gpu-exporter v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => cli.overrides.apply(config),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    let command = cli.command.unwrap_or(Commands::Serve);

    if let Err(e) = commands::handle_command(command, config).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
