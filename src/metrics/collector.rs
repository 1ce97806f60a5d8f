use crate::gpu::GpuUsageProbe;
use crate::metrics::MetricRecord;
use crate::parser::{join, GpuRows};
use crate::runtime::ContainerRuntime;
use crate::{ExporterError, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Vanished,
    Malformed,
    InspectFailed,
    GpuProbeFailed,
}

impl SkipReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Vanished => "vanished",
            SkipReason::Malformed => "malformed",
            SkipReason::InspectFailed => "inspect_failed",
            SkipReason::GpuProbeFailed => "gpu_probe_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedContainer {
    pub container_id: String,
    pub reason: SkipReason,
}

/// Result of one collection pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeReport {
    pub records: Vec<MetricRecord>,
    pub containers_seen: usize,
    pub skipped: Vec<SkippedContainer>,
    pub malformed_gpu_rows: usize,
    /// Records sharing a `{container_name, gpu}` label set with another record
    pub duplicate_series: usize,
}

enum ContainerOutcome {
    Records(Vec<MetricRecord>),
    Skipped(SkippedContainer),
}

impl ContainerOutcome {
    fn skipped(container_id: &str, reason: SkipReason) -> Self {
        ContainerOutcome::Skipped(SkippedContainer {
            container_id: container_id.to_string(),
            reason,
        })
    }
}

/// Runs the list → probe → inspect → join pipeline for one scrape
pub struct Collector {
    runtime: Arc<dyn ContainerRuntime>,
    probe: Arc<dyn GpuUsageProbe>,
    concurrency: usize,
    scrape_timeout: Duration,
}

impl Collector {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, probe: Arc<dyn GpuUsageProbe>) -> Self {
        Self {
            runtime,
            probe,
            concurrency: DEFAULT_CONCURRENCY,
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_scrape_timeout(mut self, scrape_timeout: Duration) -> Self {
        self.scrape_timeout = scrape_timeout;
        self
    }

    pub fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime.as_ref()
    }

    /// Collect one snapshot, bounded by the scrape timeout.
    ///
    /// Fails only when the container list cannot be obtained or the deadline
    /// passes; per-container problems are reported in [`ScrapeReport::skipped`].
    pub async fn collect(&self) -> Result<ScrapeReport> {
        tokio::time::timeout(self.scrape_timeout, self.collect_all())
            .await
            .map_err(|_| ExporterError::ScrapeTimeout(self.scrape_timeout))?
    }

    async fn collect_all(&self) -> Result<ScrapeReport> {
        let container_ids = self.runtime.list_containers().await?;
        let mut report = ScrapeReport {
            containers_seen: container_ids.len(),
            ..ScrapeReport::default()
        };
        if container_ids.is_empty() {
            debug!("No running containers");
            return Ok(report);
        }

        let gpu_rows = match self.probe.snapshot().await {
            Ok(rows) => {
                for rejected in &rows.rejected {
                    warn!("Dropping GPU row: {}", rejected);
                }
                report.malformed_gpu_rows = rows.rejected.len();
                Some(rows)
            }
            Err(e) => {
                warn!("{} query failed: {}", self.probe.name(), e);
                None
            }
        };
        let gpu_rows = gpu_rows.as_ref();

        let outcomes: Vec<ContainerOutcome> = stream::iter(container_ids)
            .map(move |id| async move { self.collect_container(&id, gpu_rows).await })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ContainerOutcome::Records(records) => report.records.extend(records),
                ContainerOutcome::Skipped(skipped) => report.skipped.push(skipped),
            }
        }

        report.records.sort_by(|a, b| {
            (&a.container_name, a.gpu_id, a.process_id).cmp(&(&b.container_name, b.gpu_id, b.process_id))
        });
        report
            .skipped
            .sort_by(|a, b| a.container_id.cmp(&b.container_id));
        report.duplicate_series = report
            .records
            .windows(2)
            .filter(|w| w[0].container_name == w[1].container_name && w[0].gpu_id == w[1].gpu_id)
            .count();

        debug!(
            "Scrape saw {} containers: {} records, {} skipped",
            report.containers_seen,
            report.records.len(),
            report.skipped.len()
        );

        Ok(report)
    }

    async fn collect_container(
        &self,
        container_id: &str,
        gpu_rows: Option<&GpuRows>,
    ) -> ContainerOutcome {
        let container = match self.runtime.inspect(container_id).await {
            Ok(container) => container,
            Err(ExporterError::ContainerVanished(_)) => {
                debug!("Container {} exited before inspection", container_id);
                return ContainerOutcome::skipped(container_id, SkipReason::Vanished);
            }
            Err(e @ ExporterError::MalformedOutput { .. }) => {
                warn!("Skipping container {}: {}", container_id, e);
                return ContainerOutcome::skipped(container_id, SkipReason::Malformed);
            }
            Err(e) => {
                warn!("Skipping container {}: {}", container_id, e);
                return ContainerOutcome::skipped(container_id, SkipReason::InspectFailed);
            }
        };

        match gpu_rows {
            Some(rows) => ContainerOutcome::Records(join(&container, &rows.samples)),
            None => {
                debug!(
                    "No GPU data for container {} (pid {})",
                    container.name, container.process_id
                );
                ContainerOutcome::skipped(container_id, SkipReason::GpuProbeFailed)
            }
        }
    }
}
