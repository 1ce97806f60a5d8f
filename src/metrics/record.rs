use serde::Serialize;

/// Publish-ready join of one container with one GPU usage sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricRecord {
    pub container_name: String,
    pub process_id: u32,
    pub gpu_id: u32,
    pub utilization_percent: u32,
    pub memory_used_mib: u64,
    /// Samples the container's process produced in this scrape
    pub gpu_count: u32,
}
