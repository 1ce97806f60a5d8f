pub mod nvidia_smi;
pub mod types;

pub use nvidia_smi::NvidiaSmi;
pub use types::{GpuDevice, GpuUsageSample};

use crate::parser::GpuRows;
use crate::Result;
use async_trait::async_trait;

/// Source of per-process GPU usage
#[async_trait]
pub trait GpuUsageProbe: Send + Sync {
    /// Every compute-process row the driver reports right now.
    ///
    /// Taken once per scrape and scoped to each container's pid by
    /// [`crate::parser::join`]. No rows is a normal result.
    async fn snapshot(&self) -> Result<GpuRows>;

    fn name(&self) -> &str;
}
