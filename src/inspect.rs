// ABOUTME: Runtime inspector: derives deployment state from running containers.
// ABOUTME: Nothing is persisted; every call re-reads labels from the runtime.

use serde::Serialize;

use crate::config::Config;
use crate::runtime::{ContainerFilters, InspectError, InspectOps};
use crate::types::{Color, ContainerId, Priority};

/// What the runtime says about one color right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackStatus {
    pub color: Color,
    /// Any container of the color's project is running.
    pub running: bool,
    /// The service container carries the enabled marker.
    pub traffic_enabled: bool,
    /// Parsed priority label; `None` when absent or unparsable.
    pub priority: Option<Priority>,
    /// Running container of the probed service, if any.
    pub container: Option<ContainerId>,
}

impl StackStatus {
    fn absent(color: Color) -> Self {
        Self {
            color,
            running: false,
            traffic_enabled: false,
            priority: None,
            container: None,
        }
    }
}

/// Both colors plus the derived live color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub blue: StackStatus,
    pub green: StackStatus,
    pub live: Option<Color>,
}

impl Snapshot {
    pub fn get(&self, color: Color) -> &StackStatus {
        match color {
            Color::Blue => &self.blue,
            Color::Green => &self.green,
        }
    }
}

/// Read-only queries over the two color stacks.
pub struct Inspector<'a, R> {
    runtime: &'a R,
    config: &'a Config,
}

impl<'a, R: InspectOps> Inspector<'a, R> {
    pub fn new(runtime: &'a R, config: &'a Config) -> Self {
        Self { runtime, config }
    }

    /// Whether any container of the color's project is running.
    pub async fn stack_exists(&self, color: Color) -> Result<bool, InspectError> {
        let filters = ContainerFilters::for_project(&self.config.app.project(color), None);
        Ok(!self.runtime.list_running(&filters).await?.is_empty())
    }

    /// The running container of the configured service, used as the probe target.
    pub async fn service_container_id(
        &self,
        color: Color,
    ) -> Result<Option<ContainerId>, InspectError> {
        let filters = ContainerFilters::for_project(
            &self.config.app.project(color),
            Some(&self.config.service),
        );
        let containers = self.runtime.list_running(&filters).await?;
        if containers.len() > 1 {
            let names: Vec<&str> = containers.iter().map(|c| c.name.as_str()).collect();
            tracing::debug!(%color, ?names, "several service containers, probing the first");
        }
        Ok(containers.into_iter().next().map(|c| c.id))
    }

    pub async fn stack_status(&self, color: Color) -> Result<StackStatus, InspectError> {
        if !self.stack_exists(color).await? {
            return Ok(StackStatus::absent(color));
        }

        let Some(container) = self.service_container_id(color).await? else {
            tracing::debug!(%color, service = %self.config.service, "stack running without service container");
            return Ok(StackStatus {
                running: true,
                ..StackStatus::absent(color)
            });
        };

        let labels = match self.runtime.inspect_labels(&container).await {
            Ok(labels) => labels,
            Err(InspectError::NotFound(_)) => {
                // Recreated between list and inspect; treat as disabled.
                tracing::warn!(%color, container = %container.short(), "container vanished during inspection, treating as disabled");
                Default::default()
            }
            Err(e) => return Err(e),
        };

        let traffic_enabled = labels
            .get(&self.config.traffic_label)
            .is_some_and(|v| v == &self.config.traffic_value);
        let priority = labels
            .get(&self.config.priority_label())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(Priority::new);

        Ok(StackStatus {
            color,
            running: true,
            traffic_enabled,
            priority,
            container: Some(container),
        })
    }

    /// Inspect both colors and derive the live one.
    pub async fn snapshot(&self) -> Result<Snapshot, InspectError> {
        let blue = self.stack_status(Color::Blue).await?;
        let green = self.stack_status(Color::Green).await?;

        let live = Color::ALL
            .into_iter()
            .find(|c| match c {
                Color::Blue => blue.traffic_enabled,
                Color::Green => green.traffic_enabled,
            });

        if blue.traffic_enabled && green.traffic_enabled {
            tracing::warn!("both colors are marked traffic-enabled, treating blue as live");
        }

        Ok(Snapshot { blue, green, live })
    }

    /// The color currently receiving traffic, if any.
    pub async fn live_color(&self) -> Result<Option<Color>, InspectError> {
        Ok(self.snapshot().await?.live)
    }
}
