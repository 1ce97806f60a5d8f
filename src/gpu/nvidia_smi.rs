use crate::exec::CommandRunner;
use crate::gpu::{GpuDevice, GpuUsageProbe};
use crate::parser::{parse_gpu_devices, parse_gpu_rows, GpuRows};
use crate::{ExporterError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const DEVICE_FIELDS: &str = "index,pci.bus_id,utilization.gpu";
const COMPUTE_APP_FIELDS: &str = "pid,gpu_bus_id,used_memory";
const CSV_FORMAT: &str = "--format=csv,noheader,nounits";

/// [`GpuUsageProbe`] that shells out to `nvidia-smi`
pub struct NvidiaSmi {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl NvidiaSmi {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub fn device_args() -> Vec<String> {
        vec![format!("--query-gpu={}", DEVICE_FIELDS), CSV_FORMAT.to_string()]
    }

    pub fn compute_app_args() -> Vec<String> {
        vec![
            format!("--query-compute-apps={}", COMPUTE_APP_FIELDS),
            CSV_FORMAT.to_string(),
        ]
    }

    /// Number of GPUs the driver can see
    pub async fn gpu_count(&self) -> Result<usize> {
        let (devices, rejected) = self.devices().await?;
        if let Some(e) = rejected.into_iter().next() {
            return Err(e);
        }
        Ok(devices.len())
    }

    async fn devices(&self) -> Result<(Vec<GpuDevice>, Vec<ExporterError>)> {
        let stdout = self.run(Self::device_args()).await?;
        Ok(parse_gpu_devices(&stdout))
    }

    async fn run(&self, args: Vec<String>) -> Result<String> {
        self.runner
            .run(&self.program, &args)
            .await?
            .into_success(&self.program)
    }
}

#[async_trait]
impl GpuUsageProbe for NvidiaSmi {
    async fn snapshot(&self) -> Result<GpuRows> {
        let (devices, mut rejected) = self.devices().await?;
        let stdout = self.run(Self::compute_app_args()).await?;

        let mut rows = parse_gpu_rows(&stdout, &devices);
        rejected.append(&mut rows.rejected);
        rows.rejected = rejected;

        debug!(
            "nvidia-smi reported {} compute processes on {} GPUs",
            rows.samples.len(),
            devices.len()
        );

        Ok(rows)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;

    const DEVICES: &str = "0, 00000000:3B:00.0, 45\n1, 00000000:86:00.0, 80\n";

    /// Answers the device and compute-app queries with fixed output
    struct Fixed {
        devices: CommandOutput,
        apps: Result<CommandOutput>,
    }

    impl Fixed {
        fn new(apps: CommandOutput) -> Self {
            Self {
                devices: CommandOutput::ok(DEVICES),
                apps: Ok(apps),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for Fixed {
        async fn run(&self, _program: &str, args: &[String]) -> Result<CommandOutput> {
            if args == NvidiaSmi::device_args().as_slice() {
                return Ok(self.devices.clone());
            }
            assert_eq!(args, NvidiaSmi::compute_app_args().as_slice());
            match &self.apps {
                Ok(output) => Ok(output.clone()),
                Err(_) => Err(ExporterError::ToolUnavailable {
                    tool: "nvidia-smi".to_string(),
                    reason: "not installed".to_string(),
                }),
            }
        }
    }

    fn nvidia_smi(runner: Fixed) -> NvidiaSmi {
        NvidiaSmi::new(Arc::new(runner), "nvidia-smi")
    }

    #[test]
    fn test_query_fields() {
        assert_eq!(
            NvidiaSmi::compute_app_args()[0],
            "--query-compute-apps=pid,gpu_bus_id,used_memory"
        );
        assert_eq!(
            NvidiaSmi::device_args()[0],
            "--query-gpu=index,pci.bus_id,utilization.gpu"
        );
    }

    #[tokio::test]
    async fn test_gpu_count() {
        let probe = nvidia_smi(Fixed::new(CommandOutput::ok("")));
        assert_eq!(probe.gpu_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_resolves_devices() {
        let probe = nvidia_smi(Fixed::new(CommandOutput::ok(
            "100, 00000000:86:00.0, 2048\n200, 00000000:3B:00.0, 512\n",
        )));

        let rows = probe.snapshot().await.unwrap();

        let train: Vec<_> = rows.samples.iter().filter(|s| s.process_id == 100).collect();
        assert_eq!(train.len(), 1);
        assert_eq!(train[0].gpu_index, 1);
        assert_eq!(train[0].utilization_percent, 80);
        assert_eq!(train[0].memory_used_mib, 2048);
    }

    #[tokio::test]
    async fn test_no_compute_processes() {
        let probe = nvidia_smi(Fixed::new(CommandOutput::ok("")));

        let rows = probe.snapshot().await.unwrap();
        assert!(rows.samples.is_empty());
        assert!(rows.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_bad_device_rows_are_reported() {
        let probe = nvidia_smi(Fixed {
            devices: CommandOutput::ok("0, 00000000:3B:00.0, 45\nbroken\n"),
            apps: Ok(CommandOutput::ok("100, 00000000:3B:00.0, 2048\n")),
        });

        let rows = probe.snapshot().await.unwrap();
        assert_eq!(rows.samples.len(), 1);
        assert_eq!(rows.rejected.len(), 1);
    }

    #[tokio::test]
    async fn test_driver_failure_is_an_error() {
        let probe = nvidia_smi(Fixed {
            devices: CommandOutput::failed(
                9,
                "NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver",
            ),
            apps: Ok(CommandOutput::ok("")),
        });
        assert!(matches!(
            probe.snapshot().await.unwrap_err(),
            ExporterError::ToolFailed { .. }
        ));

        let probe = nvidia_smi(Fixed {
            devices: CommandOutput::ok(DEVICES),
            apps: Err(ExporterError::ConfigError(String::new())),
        });
        assert!(matches!(
            probe.snapshot().await.unwrap_err(),
            ExporterError::ToolUnavailable { .. }
        ));
    }
}
