//! Mapping of [`MetricRecord`]s onto the exported series
//!
//! A fresh registry is built for every scrape, so series for containers that
//! stopped using a GPU disappear on the next scrape instead of going stale.

use crate::metrics::MetricRecord;
use crate::Result;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashSet;
use tracing::warn;

pub const LABELS: [&str; 2] = ["container_name", "gpu"];

pub struct MetricsPublisher {
    registry: Registry,
    running_pid: IntGaugeVec,
    container_name: IntGaugeVec,
    used_gpu_id: IntGaugeVec,
    utilization: IntGaugeVec,
    memory_used: IntGaugeVec,
    total_gpu_used: IntGaugeVec,
}

impl MetricsPublisher {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let running_pid = register(
            &registry,
            "container_running_gpu_pid",
            "Process id of the container holding a GPU compute context",
        )?;
        let container_name = register(
            &registry,
            "container_name",
            "Container using a GPU, always 1",
        )?;
        let used_gpu_id = register(
            &registry,
            "container_used_gpu_id",
            "Index of the GPU used by the container",
        )?;
        let utilization = register(
            &registry,
            "container_utilization_gpu_percent",
            "GPU utilization of the container's process in percent",
        )?;
        let memory_used = register(
            &registry,
            "container_gpu_memory_used_MiB",
            "GPU memory used by the container's process in MiB",
        )?;
        let total_gpu_used = register(
            &registry,
            "container_total_gpu_used",
            "Number of GPUs the container's process is using",
        )?;

        Ok(Self {
            registry,
            running_pid,
            container_name,
            used_gpu_id,
            utilization,
            memory_used,
            total_gpu_used,
        })
    }

    /// Build a publisher holding exactly the series for `records`
    pub fn from_records(records: &[MetricRecord]) -> Result<Self> {
        let publisher = Self::new()?;
        publisher.publish(records);
        Ok(publisher)
    }

    pub fn publish(&self, records: &[MetricRecord]) {
        let mut seen = HashSet::new();

        for record in records {
            let gpu = record.gpu_id.to_string();
            let labels = [record.container_name.as_str(), gpu.as_str()];

            if !seen.insert((record.container_name.clone(), record.gpu_id)) {
                warn!(
                    "Duplicate series for container {} gpu {}, keeping the last sample",
                    record.container_name, record.gpu_id
                );
            }

            self.running_pid
                .with_label_values(&labels)
                .set(i64::from(record.process_id));
            self.container_name.with_label_values(&labels).set(1);
            self.used_gpu_id
                .with_label_values(&labels)
                .set(i64::from(record.gpu_id));
            self.utilization
                .with_label_values(&labels)
                .set(i64::from(record.utilization_percent));
            self.memory_used
                .with_label_values(&labels)
                .set(i64::try_from(record.memory_used_mib).unwrap_or(i64::MAX));
            self.total_gpu_used
                .with_label_values(&labels)
                .set(i64::from(record.gpu_count));
        }
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render `records` in the Prometheus text format
    pub fn render(records: &[MetricRecord]) -> Result<String> {
        encode(&Self::from_records(records)?.gather())
    }
}

fn register(registry: &Registry, name: &str, help: &str) -> Result<IntGaugeVec> {
    let gauge = IntGaugeVec::new(Opts::new(name, help), &LABELS)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Encode metric families in the Prometheus text exposition format
pub fn encode(families: &[MetricFamily]) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("non UTF-8 exposition: {}", e)).into())
}
