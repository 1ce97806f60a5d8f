use crate::gpu::GpuUsageSample;
use crate::metrics::MetricRecord;
use crate::runtime::ContainerRecord;

/// Pair a container with every sample reported for its process id.
///
/// Samples for other pids (host processes, other containers) are dropped.
/// `gpu_count` on each record is the number of matching samples.
pub fn join(container: &ContainerRecord, samples: &[GpuUsageSample]) -> Vec<MetricRecord> {
    let matching: Vec<&GpuUsageSample> = samples
        .iter()
        .filter(|s| s.process_id == container.process_id)
        .collect();
    let gpu_count = matching.len() as u32;

    matching
        .into_iter()
        .map(|sample| MetricRecord {
            container_name: container.name.clone(),
            process_id: container.process_id,
            gpu_id: sample.gpu_index,
            utilization_percent: sample.utilization_percent,
            memory_used_mib: sample.memory_used_mib,
            gpu_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(pid: u32, name: &str) -> ContainerRecord {
        ContainerRecord {
            container_id: format!("id-{}", pid),
            process_id: pid,
            name: name.to_string(),
        }
    }

    fn sample(pid: u32, gpu: u32, util: u32, mem: u64) -> GpuUsageSample {
        GpuUsageSample {
            process_id: pid,
            gpu_index: gpu,
            utilization_percent: util,
            memory_used_mib: mem,
        }
    }

    #[test]
    fn test_single_match() {
        let records = join(&container(100, "train-job"), &[sample(100, 0, 45, 2048)]);

        assert_eq!(
            records,
            vec![MetricRecord {
                container_name: "train-job".to_string(),
                process_id: 100,
                gpu_id: 0,
                utilization_percent: 45,
                memory_used_mib: 2048,
                gpu_count: 1,
            }]
        );
    }

    #[test]
    fn test_multiple_gpus_fan_out() {
        let samples = [sample(100, 0, 10, 100), sample(100, 1, 20, 200), sample(100, 2, 30, 300)];
        let records = join(&container(100, "multi"), &samples);

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.gpu_count == 3));
        let gpus: Vec<u32> = records.iter().map(|r| r.gpu_id).collect();
        assert_eq!(gpus, vec![0, 1, 2]);
    }

    #[test]
    fn test_unmatched_samples_dropped() {
        let samples = [sample(1, 0, 90, 9000), sample(100, 0, 45, 2048), sample(2, 1, 5, 5)];
        let records = join(&container(100, "train-job"), &samples);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gpu_count, 1);
        assert_eq!(records[0].utilization_percent, 45);
    }

    #[test]
    fn test_no_samples_no_records() {
        assert!(join(&container(100, "idle"), &[]).is_empty());
        assert!(join(&container(100, "idle"), &[sample(5, 0, 1, 1)]).is_empty());
    }
}
