//! Decoding of `nvidia-smi` CSV output
//!
//! Two queries are combined:
//! - `--query-gpu=index,pci.bus_id,utilization.gpu` lists the devices
//! - `--query-compute-apps=pid,gpu_bus_id,used_memory` lists compute processes
//!
//! A process row is resolved to its device by bus id, which yields the GPU
//! index and the device utilization. Blank lines are skipped, as is a leading
//! header row naming the fields. Unit suffixes are stripped when `nounits` was
//! not honored, and `[N/A]` decodes to 0.

use crate::gpu::{GpuDevice, GpuUsageSample};
use crate::{ExporterError, Result};

const SOURCE: &str = "nvidia-smi";

/// Rows that decoded, plus the errors for rows that did not
#[derive(Debug, Default)]
pub struct GpuRows {
    pub samples: Vec<GpuUsageSample>,
    pub rejected: Vec<ExporterError>,
}

/// Decode `--query-gpu=index,pci.bus_id,utilization.gpu` output
pub fn parse_gpu_devices(output: &str) -> (Vec<GpuDevice>, Vec<ExporterError>) {
    let mut devices = Vec::new();
    let mut rejected = Vec::new();

    for line in data_lines(output, "index") {
        match parse_device_row(line) {
            Ok(device) => devices.push(device),
            Err(e) => rejected.push(e),
        }
    }

    (devices, rejected)
}

/// Decode `--query-compute-apps=pid,gpu_bus_id,used_memory` output against
/// the devices it refers to
pub fn parse_gpu_rows(output: &str, devices: &[GpuDevice]) -> GpuRows {
    let mut rows = GpuRows::default();

    for line in data_lines(output, "pid") {
        match parse_row(line, devices) {
            Ok(sample) => rows.samples.push(sample),
            Err(e) => rows.rejected.push(e),
        }
    }

    rows
}

/// Decode a single compute-process row
pub fn parse_row(line: &str, devices: &[GpuDevice]) -> Result<GpuUsageSample> {
    let [pid, bus_id, memory] = fields::<3>(line)?;

    let process_id = parse_number::<u32>(pid, "pid", line)?;
    let device = devices
        .iter()
        .find(|d| d.bus_id.eq_ignore_ascii_case(bus_id))
        .ok_or_else(|| {
            ExporterError::malformed(SOURCE, format!("unknown GPU bus id {:?} in {:?}", bus_id, line))
        })?;
    let memory_used_mib = parse_measurement::<u64>(memory, "memory", line)?;

    Ok(GpuUsageSample {
        process_id,
        gpu_index: device.index,
        utilization_percent: device.utilization_percent,
        memory_used_mib,
    })
}

fn parse_device_row(line: &str) -> Result<GpuDevice> {
    let [index, bus_id, utilization] = fields::<3>(line)?;

    if bus_id.is_empty() {
        return Err(ExporterError::malformed(
            SOURCE,
            format!("missing bus id in {:?}", line),
        ));
    }

    Ok(GpuDevice {
        index: parse_number::<u32>(index, "gpu index", line)?,
        bus_id: bus_id.to_string(),
        utilization_percent: parse_measurement::<u32>(utilization, "utilization", line)?,
    })
}

fn fields<const N: usize>(line: &str) -> Result<[&str; N]> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let count = fields.len();

    fields.try_into().map_err(|_| {
        ExporterError::malformed(
            SOURCE,
            format!("expected {} fields, got {} in {:?}", N, count, line),
        )
    })
}

// Non-blank lines, minus a header naming `first_field` on the first of them.
// nvidia-smi prints one (e.g. `pid, gpu_bus_id, used_gpu_memory [MiB]`) unless
// `noheader` is passed.
fn data_lines<'a>(output: &'a str, first_field: &'a str) -> impl Iterator<Item = &'a str> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter(move |(i, line)| !(*i == 0 && is_header(line, first_field)))
        .map(|(_, line)| line)
}

fn is_header(line: &str, first_field: &str) -> bool {
    line.split(',')
        .next()
        .map(|field| field.trim().eq_ignore_ascii_case(first_field))
        .unwrap_or(false)
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &str, line: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        ExporterError::malformed(SOURCE, format!("invalid {} {:?} in {:?}", field, value, line))
    })
}

fn parse_measurement<T>(value: &str, field: &str, line: &str) -> Result<T>
where
    T: std::str::FromStr + Default,
{
    if is_not_available(value) {
        return Ok(T::default());
    }

    let value = value
        .trim_end_matches("MiB")
        .trim_end_matches('%')
        .trim_end();
    parse_number(value, field, line)
}

fn is_not_available(value: &str) -> bool {
    matches!(
        value.trim_matches(|c| c == '[' || c == ']'),
        "N/A" | "Not Supported" | "Insufficient Permissions"
    )
}
