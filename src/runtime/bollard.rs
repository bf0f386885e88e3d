// ABOUTME: Bollard-based runtime API client for inspection and exec.
// ABOUTME: Supports both Docker and Podman via the Docker-compatible API.

use crate::runtime::error::ConnectError;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    ContainerFilters, ContainerSummary, ExecError, ExecOps, ExecResult, InspectError, InspectOps,
};
use crate::runtime::types::{RuntimeInfo, RuntimeType};
use crate::types::{ContainerId, ExecId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::StartExecOptions;
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_inspect_error(e: bollard::errors::Error) -> InspectError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => InspectError::NotFound(message.clone()),
        bollard::errors::Error::JsonDataError { .. }
        | bollard::errors::Error::JsonSerdeError { .. } => InspectError::Malformed(e.to_string()),
        _ => InspectError::Unreachable(e.to_string()),
    }
}

fn map_exec_create_error(e: bollard::errors::Error) -> ExecError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ExecError::ContainerNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ExecError::ContainerNotRunning(message.clone()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

fn map_exec_not_found_error(e: bollard::errors::Error) -> ExecError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ExecError::ExecNotFound(message.clone()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Runtime API client.
///
/// Handles everything that reads runtime state or runs commands inside
/// containers. Provisioning goes through the compose CLI instead.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to the runtime socket described by `info` and verify it answers.
    pub async fn connect(info: &RuntimeInfo) -> Result<Self, ConnectError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| ConnectError::ConnectionFailed(e.to_string()))?;
        client
            .ping()
            .await
            .map_err(|e| ConnectError::Unresponsive(e.to_string()))?;
        tracing::debug!(
            runtime = %info.runtime_type,
            socket = %info.socket_path,
            "connected to container runtime"
        );
        Ok(Self::new(client, info.runtime_type))
    }

    async fn exec_create(
        &self,
        container: &ContainerId,
        cmd: &[String],
        detach: bool,
    ) -> Result<ExecId, ExecError> {
        let opts = bollard::models::ExecConfig {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(!detach),
            attach_stderr: Some(!detach),
            tty: Some(false),
            ..Default::default()
        };

        let response = self
            .client
            .create_exec(container.as_str(), opts)
            .await
            .map_err(map_exec_create_error)?;

        Ok(ExecId::new(response.id))
    }

    /// Exit code of a finished exec, or None while it is still running.
    async fn exec_exit_code(&self, exec_id: &ExecId) -> Result<Option<i64>, ExecError> {
        let details = self
            .client
            .inspect_exec(exec_id.as_str())
            .await
            .map_err(map_exec_not_found_error)?;

        finished_exit_code(exec_id, details.running, details.exit_code)
    }

    /// Poll until the exec has finished and report its exit code.
    /// The caller bounds the wait.
    async fn wait_exit_code(&self, exec_id: &ExecId) -> Result<i64, ExecError> {
        let poll_interval = Duration::from_millis(100);
        loop {
            if let Some(exit_code) = self.exec_exit_code(exec_id).await? {
                return Ok(exit_code);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Execute in detached mode and poll for completion.
    /// Podman's attached exec streams do not always close.
    async fn exec_detached(&self, exec_id: &ExecId) -> Result<ExecResult, ExecError> {
        let opts = StartExecOptions {
            detach: true,
            ..Default::default()
        };

        self.client
            .start_exec(exec_id.as_str(), Some(opts))
            .await
            .map_err(map_exec_not_found_error)?;

        Ok(ExecResult {
            exit_code: self.wait_exit_code(exec_id).await?,
            ..Default::default()
        })
    }

    async fn exec_attached(&self, exec_id: &ExecId) -> Result<ExecResult, ExecError> {
        let opts = StartExecOptions {
            detach: false,
            ..Default::default()
        };

        let result = self
            .client
            .start_exec(exec_id.as_str(), Some(opts))
            .await
            .map_err(map_exec_not_found_error)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        if let bollard::exec::StartExecResults::Attached { mut output, .. } = result {
            while let Some(item) = output.next().await {
                match item {
                    Ok(bollard::container::LogOutput::StdOut { message }) => {
                        stdout.extend(message);
                    }
                    Ok(bollard::container::LogOutput::StdErr { message }) => {
                        stderr.extend(message);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(ExecError::Failed(e.to_string()));
                    }
                }
            }
        }

        // The stream can close before the daemon records the exit code.
        let exit_code = self.wait_exit_code(exec_id).await?;

        Ok(ExecResult {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// An exec that has stopped without an exit code has an unknown result,
/// which must never read as success.
fn finished_exit_code(
    exec_id: &ExecId,
    running: Option<bool>,
    exit_code: Option<i64>,
) -> Result<Option<i64>, ExecError> {
    match (running, exit_code) {
        (Some(true), _) => Ok(None),
        (_, Some(code)) => Ok(Some(code)),
        (_, None) => Err(ExecError::Failed(format!(
            "exec {} finished without an exit code",
            exec_id.short()
        ))),
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl InspectOps for BollardRuntime {
    async fn list_running(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, InspectError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: false,
            filters: Some(filter_map),
            ..Default::default()
        };

        // Podman reports a transient "stopping" state that bollard cannot
        // deserialize; retry briefly before giving up.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers
                        .into_iter()
                        .map(|c| {
                            let name = c
                                .names
                                .unwrap_or_default()
                                .first()
                                .map(|n| n.trim_start_matches('/').to_string())
                                .unwrap_or_default();

                            ContainerSummary {
                                id: ContainerId::new(c.id.unwrap_or_default()),
                                name,
                                labels: c.labels.unwrap_or_default(),
                            }
                        })
                        .collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(map_inspect_error(e));
                }
            }
        }

        Err(last_error.map(map_inspect_error).unwrap_or_else(|| {
            InspectError::Unreachable("list_containers failed".to_string())
        }))
    }

    async fn inspect_labels(
        &self,
        id: &ContainerId,
    ) -> Result<HashMap<String, String>, InspectError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_inspect_error)?;

        Ok(details
            .config
            .and_then(|c| c.labels)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExecOps for BollardRuntime {
    async fn exec(
        &self,
        container: &ContainerId,
        cmd: &[String],
    ) -> Result<ExecResult, ExecError> {
        let detach = self.runtime_type == RuntimeType::Podman;
        let exec_id = self.exec_create(container, cmd, detach).await?;

        if detach {
            self.exec_detached(&exec_id).await
        } else {
            self.exec_attached(&exec_id).await
        }
    }
}
