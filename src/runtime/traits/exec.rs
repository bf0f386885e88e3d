// ABOUTME: Exec operations trait for container runtimes.
// ABOUTME: Runs a command inside a running container and reports its exit code.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;

/// Run commands in containers.
#[async_trait]
pub trait ExecOps: Sealed + Send + Sync {
    /// Run `cmd` inside `container` and wait for it to finish.
    async fn exec(&self, container: &ContainerId, cmd: &[String])
    -> Result<ExecResult, ExecError>;
}

/// Result of an exec operation.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr as lossy UTF-8, trimmed.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Errors from exec operations.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container not running: {0}")]
    ContainerNotRunning(String),

    #[error("exec instance not found: {0}")]
    ExecNotFound(String),

    #[error("exec failed: {0}")]
    Failed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
