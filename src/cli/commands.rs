use crate::cli::{Commands, OutputFormat};
use crate::config::Config;
use crate::exec::{CommandRunner, ProcessRunner};
use crate::gpu::NvidiaSmi;
use crate::metrics::{Collector, ExporterMetrics, MetricsPublisher, PrometheusExporter};
use crate::runtime::Crictl;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

pub async fn handle_command(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Serve => handle_serve(config).await,
        Commands::Collect { format } => handle_collect(config, format).await,
        Commands::Check => handle_check(config).await,
    }
}

fn command_runner(config: &Config) -> Arc<dyn CommandRunner> {
    Arc::new(ProcessRunner::new(config.command_timeout()))
}

fn build_collector(config: &Config) -> Collector {
    let runner = command_runner(config);

    let runtime = Crictl::new(runner.clone(), config.crictl_path.clone())
        .with_endpoint(config.runtime_endpoint.clone());
    let probe = NvidiaSmi::new(runner, config.nvidia_smi_path.clone());

    Collector::new(Arc::new(runtime), Arc::new(probe))
        .with_concurrency(config.concurrency)
        .with_scrape_timeout(config.scrape_timeout())
}

async fn handle_serve(config: Config) -> Result<()> {
    let collector = build_collector(&config);
    let diagnostics = ExporterMetrics::new(config.process_metrics)?;
    let exporter = PrometheusExporter::new(collector, diagnostics, config.min_scrape_interval());

    info!(
        "Collecting with {} and {} (concurrency {}, scrape timeout {:?})",
        config.crictl_path,
        config.nvidia_smi_path,
        config.concurrency,
        config.scrape_timeout()
    );

    exporter
        .serve(config.socket_addr(), shutdown_signal())
        .await
        .with_context(|| format!("Metrics server on {} failed", config.socket_addr()))
}

async fn handle_collect(config: Config, format: OutputFormat) -> Result<()> {
    let collector = build_collector(&config);
    let report = collector.collect().await.context("Scrape failed")?;

    for skipped in &report.skipped {
        info!(
            "Skipped container {} ({})",
            skipped.container_id,
            skipped.reason.as_str()
        );
    }

    match format {
        OutputFormat::Prometheus => print!("{}", MetricsPublisher::render(&report.records)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

async fn handle_check(config: Config) -> Result<()> {
    let collector = build_collector(&config);
    let probe = NvidiaSmi::new(command_runner(&config), config.nvidia_smi_path.clone());
    let mut healthy = true;

    match collector.runtime().list_containers().await {
        Ok(ids) => println!(
            "{}: ok ({} running containers)",
            collector.runtime().name(),
            ids.len()
        ),
        Err(e) => {
            healthy = false;
            println!("{}: FAILED ({})", collector.runtime().name(), e);
        }
    }

    match probe.gpu_count().await {
        Ok(count) => println!("{}: ok ({} GPUs)", config.nvidia_smi_path, count),
        Err(e) => {
            healthy = false;
            println!("{}: FAILED ({})", config.nvidia_smi_path, e);
        }
    }

    if !healthy {
        bail!("One or more external tools are unavailable");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}
