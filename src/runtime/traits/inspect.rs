// ABOUTME: Read-only inspection trait for container runtimes.
// ABOUTME: Lists running containers by label and reads their labels.

use super::sealed::Sealed;
use crate::types::{ContainerId, ProjectName, ServiceName};
use async_trait::async_trait;
use std::collections::HashMap;

/// Label compose stamps on every container with its project name.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Label compose stamps on every container with its service name.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// Read-only container queries.
#[async_trait]
pub trait InspectOps: Sealed + Send + Sync {
    /// List running containers matching the given filters.
    async fn list_running(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, InspectError>;

    /// Read the labels of a single container.
    async fn inspect_labels(
        &self,
        id: &ContainerId,
    ) -> Result<HashMap<String, String>, InspectError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by name (substring match).
    pub name: Option<String>,
}

impl ContainerFilters {
    /// Containers belonging to one color's compose project, optionally
    /// narrowed to a single service.
    pub fn for_project(project: &ProjectName, service: Option<&ServiceName>) -> Self {
        let mut labels = HashMap::new();
        labels.insert(
            COMPOSE_PROJECT_LABEL.to_string(),
            project.as_str().to_string(),
        );
        if let Some(service) = service {
            labels.insert(
                COMPOSE_SERVICE_LABEL.to_string(),
                service.as_str().to_string(),
            );
        }
        Self { labels, name: None }
    }

    /// Whether a container with these labels passes the label filters.
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub name: String,
    pub labels: HashMap<String, String>,
}

/// Errors from inspection. All of them mean the runtime could not be read.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("container runtime unreachable: {0}")]
    Unreachable(String),

    #[error("container not found: {0}")]
    NotFound(String),

    #[error("malformed runtime response: {0}")]
    Malformed(String),
}
