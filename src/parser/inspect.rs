//! Decoding of `crictl` output
//!
//! `crictl inspect -o json` returns a document whose `info` section carries
//! the container's init pid. The container name has moved between crictl and
//! containerd releases, so it is looked up in `info.metadata`,
//! `info.config.metadata` and `status.metadata`, in that order.

use crate::runtime::ContainerRecord;
use crate::{ExporterError, Result};
use serde::Deserialize;

const SOURCE: &str = "crictl inspect";

#[derive(Debug, Deserialize)]
struct InspectPayload {
    info: Option<InspectInfo>,
    status: Option<InspectStatus>,
}

#[derive(Debug, Deserialize)]
struct InspectInfo {
    pid: Option<i64>,
    metadata: Option<Metadata>,
    config: Option<InspectConfig>,
}

#[derive(Debug, Deserialize)]
struct InspectConfig {
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct InspectStatus {
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: Option<String>,
}

/// Split `crictl ps --quiet` output into container ids
pub fn parse_container_ids(output: &str) -> Vec<String> {
    output.split_whitespace().map(str::to_string).collect()
}

/// Decode an inspection payload for `container_id`.
///
/// JSON is tried first; YAML is accepted as a fallback so `-o yaml` output
/// decodes too. A pid of 0 means the container's process has already exited
/// and is reported as [`ExporterError::ContainerVanished`].
pub fn parse_inspect_payload(container_id: &str, output: &str) -> Result<ContainerRecord> {
    if output.trim().is_empty() {
        return Err(ExporterError::malformed(SOURCE, "empty payload"));
    }

    let payload: InspectPayload = match serde_json::from_str(output) {
        Ok(payload) => payload,
        Err(json_err) => serde_yaml::from_str(output).map_err(|_| {
            ExporterError::malformed(SOURCE, format!("undecodable payload: {}", json_err))
        })?,
    };

    let info = payload
        .info
        .ok_or_else(|| ExporterError::malformed(SOURCE, "missing info section"))?;

    let pid = info
        .pid
        .ok_or_else(|| ExporterError::malformed(SOURCE, "missing info.pid"))?;
    if pid == 0 {
        return Err(ExporterError::ContainerVanished(container_id.to_string()));
    }
    let process_id = u32::try_from(pid)
        .map_err(|_| ExporterError::malformed(SOURCE, format!("invalid info.pid {}", pid)))?;

    let name = info
        .metadata
        .and_then(|m| m.name)
        .or_else(|| info.config.and_then(|c| c.metadata).and_then(|m| m.name))
        .or_else(|| payload.status.and_then(|s| s.metadata).and_then(|m| m.name))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ExporterError::malformed(SOURCE, "missing container name"))?;

    Ok(ContainerRecord {
        container_id: container_id.to_string(),
        process_id,
        name,
    })
}

/// Whether a failed `crictl inspect` reports that the container is gone
pub fn is_not_found(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("not found") || stderr.contains("notfound") || stderr.contains("no such")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_ids_ignore_blank_lines() {
        let ids = parse_container_ids("\n  abc123 \n\ndef456\n\n");
        assert_eq!(ids, vec!["abc123".to_string(), "def456".to_string()]);
        assert!(parse_container_ids("   \n").is_empty());
    }

    #[test]
    fn test_inspect_info_metadata() {
        let payload = r#"{"info": {"pid": 100, "metadata": {"name": "train-job"}}}"#;
        let record = parse_inspect_payload("c1", payload).unwrap();

        assert_eq!(record.container_id, "c1");
        assert_eq!(record.process_id, 100);
        assert_eq!(record.name, "train-job");
    }

    #[test]
    fn test_inspect_ignores_key_order_and_whitespace() {
        let payload = "\n\n  {\n \"status\": {\"metadata\": {\"name\": \"other\"}},\n \
                       \"info\": {\"metadata\": {\"name\":   \"train-job\"},\n    \"pid\": 4242\n  }\n}\n\n";
        let record = parse_inspect_payload("c1", payload).unwrap();

        assert_eq!(record.process_id, 4242);
        assert_eq!(record.name, "train-job");
    }

    #[test]
    fn test_inspect_falls_back_to_config_then_status() {
        let payload = r#"{
            "status": {"metadata": {"name": "from-status"}},
            "info": {"pid": 7, "config": {"metadata": {"name": "from-config"}}}
        }"#;
        assert_eq!(parse_inspect_payload("c", payload).unwrap().name, "from-config");

        let payload = r#"{"status": {"metadata": {"name": "from-status"}}, "info": {"pid": 7}}"#;
        assert_eq!(parse_inspect_payload("c", payload).unwrap().name, "from-status");
    }

    #[test]
    fn test_inspect_accepts_yaml() {
        let payload = "info:\n  pid: 55\n  metadata:\n    name: yaml-job\n";
        let record = parse_inspect_payload("c1", payload).unwrap();

        assert_eq!(record.process_id, 55);
        assert_eq!(record.name, "yaml-job");
    }

    #[test]
    fn test_inspect_missing_pid_is_malformed() {
        let payload = r#"{"info": {"metadata": {"name": "x"}}}"#;
        let err = parse_inspect_payload("c1", payload).unwrap_err();
        assert!(matches!(err, ExporterError::MalformedOutput { .. }));
    }

    #[test]
    fn test_inspect_missing_name_is_malformed() {
        let payload = r#"{"info": {"pid": 10, "metadata": {"name": "  "}}}"#;
        let err = parse_inspect_payload("c1", payload).unwrap_err();
        assert!(matches!(err, ExporterError::MalformedOutput { .. }));
    }

    #[test]
    fn test_inspect_ill_typed_pid_is_malformed() {
        let payload = r#"{"info": {"pid": "abc", "metadata": {"name": "x"}}}"#;
        let err = parse_inspect_payload("c1", payload).unwrap_err();
        assert!(matches!(err, ExporterError::MalformedOutput { .. }));

        let payload = r#"{"info": {"pid": -4, "metadata": {"name": "x"}}}"#;
        let err = parse_inspect_payload("c1", payload).unwrap_err();
        assert!(matches!(err, ExporterError::MalformedOutput { .. }));
    }

    #[test]
    fn test_inspect_zero_pid_is_vanished() {
        let payload = r#"{"info": {"pid": 0, "metadata": {"name": "done"}}}"#;
        let err = parse_inspect_payload("c9", payload).unwrap_err();
        assert!(matches!(err, ExporterError::ContainerVanished(id) if id == "c9"));
    }

    #[test]
    fn test_inspect_empty_is_malformed() {
        let err = parse_inspect_payload("c1", " \n").unwrap_err();
        assert!(matches!(err, ExporterError::MalformedOutput { .. }));
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found(
            "level=fatal msg=\"getting the status of the container: rpc error: code = NotFound\""
        ));
        assert!(is_not_found("container \"abc\" not found"));
        assert!(!is_not_found("connection refused"));
    }
}
