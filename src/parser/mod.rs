//! Normalization of `crictl` and `nvidia-smi` output into typed records

pub mod gpu;
pub mod inspect;
pub mod join;

pub use gpu::{parse_gpu_devices, parse_gpu_rows, GpuRows};
pub use inspect::{parse_container_ids, parse_inspect_payload};
pub use join::join;
