//! Self-diagnostics of the exporter
//!
//! Unlike the per-scrape container series these live for the whole process.
//! No default collectors are registered; the process collector is opt-in.

use crate::metrics::collector::ScrapeReport;
use crate::Result;
use prometheus::proto::MetricFamily;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Success,
    Failure,
    Timeout,
}

impl ScrapeOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScrapeOutcome::Success => "success",
            ScrapeOutcome::Failure => "failure",
            ScrapeOutcome::Timeout => "timeout",
        }
    }
}

pub struct ExporterMetrics {
    registry: Registry,
    scrapes: IntCounterVec,
    skipped_containers: IntCounterVec,
    malformed_gpu_rows: IntCounter,
    duplicate_series: IntCounter,
    scrape_duration: Histogram,
}

impl ExporterMetrics {
    pub fn new(process_metrics: bool) -> Result<Self> {
        let registry = Registry::new();

        let scrapes = IntCounterVec::new(
            Opts::new("gpu_exporter_scrapes_total", "Scrapes by outcome"),
            &["outcome"],
        )?;
        let skipped_containers = IntCounterVec::new(
            Opts::new(
                "gpu_exporter_skipped_containers_total",
                "Containers left out of a scrape, by reason",
            ),
            &["reason"],
        )?;
        let malformed_gpu_rows = IntCounter::new(
            "gpu_exporter_malformed_gpu_rows_total",
            "nvidia-smi rows that could not be decoded",
        )?;
        let duplicate_series = IntCounter::new(
            "gpu_exporter_duplicate_series_total",
            "Container records dropped because another record had the same labels",
        )?;
        let scrape_duration = Histogram::with_opts(
            HistogramOpts::new(
                "gpu_exporter_scrape_duration_seconds",
                "Time spent collecting container GPU usage",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0]),
        )?;

        registry.register(Box::new(scrapes.clone()))?;
        registry.register(Box::new(skipped_containers.clone()))?;
        registry.register(Box::new(malformed_gpu_rows.clone()))?;
        registry.register(Box::new(duplicate_series.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;

        if process_metrics {
            register_process_collector(&registry)?;
        }

        Ok(Self {
            registry,
            scrapes,
            skipped_containers,
            malformed_gpu_rows,
            duplicate_series,
            scrape_duration,
        })
    }

    pub fn observe_scrape(&self, outcome: ScrapeOutcome, elapsed: Duration) {
        self.scrapes.with_label_values(&[outcome.as_str()]).inc();
        self.scrape_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_report(&self, report: &ScrapeReport) {
        for skipped in &report.skipped {
            self.skipped_containers
                .with_label_values(&[skipped.reason.as_str()])
                .inc();
        }
        self.malformed_gpu_rows.inc_by(report.malformed_gpu_rows as u64);
        self.duplicate_series.inc_by(report.duplicate_series as u64);
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

#[cfg(target_os = "linux")]
fn register_process_collector(registry: &Registry) -> Result<()> {
    use prometheus::process_collector::ProcessCollector;

    registry.register(Box::new(ProcessCollector::for_self()))?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn register_process_collector(_registry: &Registry) -> Result<()> {
    tracing::warn!("Process metrics are only available on Linux, ignoring");
    Ok(())
}
