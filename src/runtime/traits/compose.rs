// ABOUTME: Provisioning trait for compose-managed stacks.
// ABOUTME: Brings a whole color project up or down as one unit.

use super::sealed::Sealed;
use crate::types::ProjectName;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Idempotent project-level provisioning.
#[async_trait]
pub trait ComposeOps: Sealed + Send + Sync {
    /// Ensure the project is running with the given environment.
    /// Containers whose configuration changed are recreated in place.
    async fn up(
        &self,
        project: &ProjectName,
        env: &HashMap<String, String>,
    ) -> Result<(), ProvisionError>;

    /// Stop and remove every container of the project. No-op if already down.
    async fn down(&self, project: &ProjectName) -> Result<(), ProvisionError>;
}

/// A provisioning command failed.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", exit_description(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}
