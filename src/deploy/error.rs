// ABOUTME: Error types for deployment operations.
// ABOUTME: Covers inspection, provisioning, health gate, rollback, lock and confirmation failures.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::runtime::{InspectError, ProvisionError};
use crate::types::Color;

/// Errors that can abort a deployment operation.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The runtime could not be queried. Nothing was mutated.
    #[error("failed to inspect runtime: {0}")]
    Inspection(#[from] InspectError),

    /// A provisioning step failed. Earlier steps are not undone.
    #[error("failed to provision stack: {0}")]
    Provision(#[from] ProvisionError),

    /// The new color never passed its health gate. The old color stays live.
    #[error(
        "{color} did not become healthy within {}s ({attempts} attempts); it was left running but not promoted",
        .timeout.as_secs()
    )]
    HealthCheckTimeout {
        color: Color,
        timeout: Duration,
        attempts: u32,
    },

    #[error("cannot roll back: {0}")]
    InvalidRollbackTarget(String),

    /// Another invocation holds the deploy lock for this application.
    #[error("deploy lock for {app} is held by {holder} (pid {pid}) since {started_at}; use --force to break it")]
    LockHeld {
        app: String,
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("deploy lock error: {0}")]
    Lock(String),

    /// Promotion was declined at the confirmation gate.
    #[error("promotion of {0} was not confirmed; it was left running but not promoted")]
    NotConfirmed(Color),
}

/// Coarse category of a [`DeployError`], for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Inspection,
    Provision,
    HealthCheckTimeout,
    InvalidRollbackTarget,
    Lock,
    NotConfirmed,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Inspection(_) => DeployErrorKind::Inspection,
            DeployError::Provision(_) => DeployErrorKind::Provision,
            DeployError::HealthCheckTimeout { .. } => DeployErrorKind::HealthCheckTimeout,
            DeployError::InvalidRollbackTarget(_) => DeployErrorKind::InvalidRollbackTarget,
            DeployError::LockHeld { .. } | DeployError::Lock(_) => DeployErrorKind::Lock,
            DeployError::NotConfirmed(_) => DeployErrorKind::NotConfirmed,
        }
    }

    pub(crate) fn lock_error(message: impl Into<String>) -> Self {
        DeployError::Lock(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_timeout_message_names_color_and_budget() {
        let err = DeployError::HealthCheckTimeout {
            color: Color::Green,
            timeout: Duration::from_secs(60),
            attempts: 30,
        };
        let message = err.to_string();
        assert!(message.contains("green"));
        assert!(message.contains("60s"));
        assert_eq!(err.kind(), DeployErrorKind::HealthCheckTimeout);
    }

    #[test]
    fn lock_variants_share_a_kind() {
        let held = DeployError::LockHeld {
            app: "app".to_string(),
            holder: "ci-runner".to_string(),
            pid: 42,
            started_at: Utc::now(),
        };
        assert_eq!(held.kind(), DeployErrorKind::Lock);
        assert!(held.to_string().contains("ci-runner"));
        assert_eq!(DeployError::lock_error("io").kind(), DeployErrorKind::Lock);
    }

    #[test]
    fn inspection_errors_convert() {
        let err: DeployError = InspectError::Unreachable("socket closed".to_string()).into();
        assert_eq!(err.kind(), DeployErrorKind::Inspection);
    }
}
