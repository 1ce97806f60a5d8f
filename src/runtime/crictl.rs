use crate::exec::CommandRunner;
use crate::parser::inspect::is_not_found;
use crate::parser::{parse_container_ids, parse_inspect_payload};
use crate::runtime::{ContainerRecord, ContainerRuntime};
use crate::{ExporterError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// [`ContainerRuntime`] that shells out to `crictl`
pub struct Crictl {
    runner: Arc<dyn CommandRunner>,
    program: String,
    endpoint: Option<String>,
}

impl Crictl {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            endpoint: None,
        }
    }

    /// Talk to a specific CRI socket instead of crictl's configured default
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = Vec::with_capacity(rest.len() + 2);
        if let Some(endpoint) = &self.endpoint {
            args.push("--runtime-endpoint".to_string());
            args.push(endpoint.clone());
        }
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    }
}

#[async_trait]
impl ContainerRuntime for Crictl {
    async fn list_containers(&self) -> Result<Vec<String>> {
        let stdout = self
            .runner
            .run(&self.program, &self.args(&["ps", "--quiet"]))
            .await?
            .into_success(&self.program)?;

        let ids = parse_container_ids(&stdout);
        debug!("crictl listed {} running containers", ids.len());
        Ok(ids)
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerRecord> {
        let output = self
            .runner
            .run(
                &self.program,
                &self.args(&["inspect", "--output", "json", container_id]),
            )
            .await?;

        if !output.success && is_not_found(&output.stderr) {
            return Err(ExporterError::ContainerVanished(container_id.to_string()));
        }

        let stdout = output.into_success(&self.program)?;
        parse_inspect_payload(container_id, &stdout)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use std::sync::Mutex;

    struct Recorder {
        calls: Mutex<Vec<Vec<String>>>,
        output: CommandOutput,
    }

    #[async_trait]
    impl CommandRunner for Recorder {
        async fn run(&self, _program: &str, args: &[String]) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(self.output.clone())
        }
    }

    fn recorder(output: CommandOutput) -> Arc<Recorder> {
        Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
            output,
        })
    }

    #[tokio::test]
    async fn test_list_passes_endpoint() {
        let runner = recorder(CommandOutput::ok("a1\nb2\n"));
        let crictl = Crictl::new(runner.clone(), "crictl")
            .with_endpoint(Some("unix:///run/containerd/containerd.sock".to_string()));

        let ids = crictl.list_containers().await.unwrap();

        assert_eq!(ids, vec!["a1", "b2"]);
        let calls = runner.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            vec![
                "--runtime-endpoint",
                "unix:///run/containerd/containerd.sock",
                "ps",
                "--quiet"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_failure_is_an_error() {
        let crictl = Crictl::new(
            recorder(CommandOutput::failed(1, "connect: connection refused")),
            "crictl",
        );

        let err = crictl.list_containers().await.unwrap_err();
        assert!(matches!(err, ExporterError::ToolFailed { .. }));
    }

    #[tokio::test]
    async fn test_inspect_not_found_is_vanished() {
        let crictl = Crictl::new(
            recorder(CommandOutput::failed(
                1,
                "rpc error: code = NotFound desc = an error occurred",
            )),
            "crictl",
        );

        let err = crictl.inspect("gone").await.unwrap_err();
        assert!(matches!(err, ExporterError::ContainerVanished(id) if id == "gone"));
    }

    #[tokio::test]
    async fn test_inspect_decodes_payload() {
        let runner = recorder(CommandOutput::ok(
            r#"{"info": {"pid": 321, "config": {"metadata": {"name": "infer"}}}}"#,
        ));
        let crictl = Crictl::new(runner.clone(), "crictl");

        let record = crictl.inspect("c7").await.unwrap();

        assert_eq!(record.process_id, 321);
        assert_eq!(record.name, "infer");
        assert_eq!(
            runner.calls.lock().unwrap()[0],
            vec!["inspect", "--output", "json", "c7"]
        );
    }
}
