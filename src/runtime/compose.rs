// ABOUTME: Compose CLI driver for provisioning color stacks.
// ABOUTME: Runs `docker compose` / `podman compose` as bounded child processes.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{ComposeOps, ProvisionError};
use crate::runtime::types::RuntimeType;
use crate::types::ProjectName;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Image pull behavior passed to `compose up --pull`.
pub const DEFAULT_PULL_POLICY: &str = "always";

/// Upper bound on a single compose invocation.
pub const DEFAULT_COMPOSE_TIMEOUT: Duration = Duration::from_secs(300);

/// Provisions stacks through the runtime's compose subcommand.
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    host_var: &'static str,
    host: Option<String>,
    compose_file: Option<PathBuf>,
    pull_policy: String,
    timeout: Duration,
}

impl ComposeCli {
    pub fn new(runtime: RuntimeType) -> Self {
        Self {
            program: runtime.program().to_string(),
            host_var: match runtime {
                RuntimeType::Docker => "DOCKER_HOST",
                RuntimeType::Podman => "CONTAINER_HOST",
            },
            host: None,
            compose_file: None,
            pull_policy: DEFAULT_PULL_POLICY.to_string(),
            timeout: DEFAULT_COMPOSE_TIMEOUT,
        }
    }

    /// Use an explicit compose file instead of compose's own lookup.
    pub fn compose_file(mut self, path: Option<PathBuf>) -> Self {
        self.compose_file = path;
        self
    }

    /// Point compose at the same socket the API client uses.
    pub fn host(mut self, socket_path: &str) -> Self {
        self.host = Some(format!("unix://{socket_path}"));
        self
    }

    pub fn pull_policy(mut self, policy: impl Into<String>) -> Self {
        self.pull_policy = policy.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn base_args(&self, project: &ProjectName) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-p".to_string(),
            project.as_str().to_string(),
        ];
        if let Some(file) = &self.compose_file {
            args.push("-f".to_string());
            args.push(file.display().to_string());
        }
        args
    }

    /// Arguments for `up`: detached, refreshed images, stale services removed.
    pub fn up_args(&self, project: &ProjectName) -> Vec<String> {
        let mut args = self.base_args(project);
        args.extend(
            ["up", "-d", "--pull", self.pull_policy.as_str(), "--remove-orphans"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    pub fn down_args(&self, project: &ProjectName) -> Vec<String> {
        let mut args = self.base_args(project);
        args.extend(["down", "--remove-orphans"].iter().map(|s| s.to_string()));
        args
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    async fn run(
        &self,
        args: Vec<String>,
        env: &HashMap<String, String>,
    ) -> Result<(), ProvisionError> {
        let command = self.describe(&args);
        tracing::debug!(%command, "running compose");

        let mut cmd = Command::new(&self.program);
        if let Some(host) = &self.host {
            cmd.env(self.host_var, host);
        }
        let child = cmd
            .args(&args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(ProvisionError::Spawn { command, source }),
            Err(_elapsed) => {
                return Err(ProvisionError::Timeout {
                    command,
                    after: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ProvisionError::Failed {
                command,
                code: output.status.code(),
                stderr,
            });
        }

        Ok(())
    }
}

impl Sealed for ComposeCli {}

#[async_trait]
impl ComposeOps for ComposeCli {
    async fn up(
        &self,
        project: &ProjectName,
        env: &HashMap<String, String>,
    ) -> Result<(), ProvisionError> {
        self.run(self.up_args(project), env).await
    }

    async fn down(&self, project: &ProjectName) -> Result<(), ProvisionError> {
        self.run(self.down_args(project), &HashMap::new()).await
    }
}
