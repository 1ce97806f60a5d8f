use serde::Serialize;

/// One compute process row reported by the GPU driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GpuUsageSample {
    pub process_id: u32,
    pub gpu_index: u32,
    /// Utilization of the whole device the process runs on
    pub utilization_percent: u32,
    pub memory_used_mib: u64,
}

/// A GPU as listed by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDevice {
    pub index: u32,
    pub bus_id: String,
    pub utilization_percent: u32,
}
