// ABOUTME: Stack controller: provisions a color with declared traffic attributes.
// ABOUTME: Each color is its own compose project so the two stacks never collide.

use std::collections::HashMap;

use crate::config::Config;
use crate::runtime::{ComposeOps, ProvisionError};
use crate::types::{Color, Priority};

/// Compose variable carrying the color being provisioned.
pub const ENV_COLOR: &str = "DEPLOY_COLOR";
/// Compose variable the compose file maps onto the traffic-enabled label.
pub const ENV_TRAFFIC_ENABLED: &str = "TRAFFIC_ENABLED";
/// Compose variable the compose file maps onto the priority label.
pub const ENV_PRIORITY: &str = "TRAFFIC_PRIORITY";

/// Declared routing attributes for a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traffic {
    Enabled(Priority),
    Disabled,
}

impl Traffic {
    pub fn is_enabled(self) -> bool {
        matches!(self, Traffic::Enabled(_))
    }

    pub fn priority(self) -> Priority {
        match self {
            Traffic::Enabled(priority) => priority,
            Traffic::Disabled => Priority::DISABLED,
        }
    }
}

pub struct StackController<'a, C> {
    compose: &'a C,
    config: &'a Config,
}

impl<'a, C: ComposeOps> StackController<'a, C> {
    pub fn new(compose: &'a C, config: &'a Config) -> Self {
        Self { compose, config }
    }

    /// Environment handed to compose for one provisioning call.
    pub fn environment(&self, color: Color, traffic: Traffic) -> HashMap<String, String> {
        let enabled = if traffic.is_enabled() {
            self.config.traffic_value.clone()
        } else {
            "false".to_string()
        };

        let mut env = HashMap::new();
        env.insert(ENV_COLOR.to_string(), color.to_string());
        env.insert(ENV_TRAFFIC_ENABLED.to_string(), enabled);
        env.insert(ENV_PRIORITY.to_string(), traffic.priority().to_string());
        env.insert(
            "COMPOSE_PROJECT_NAME".to_string(),
            self.config.app.project(color).to_string(),
        );
        env
    }

    /// Ensure `color` is running with the given traffic attributes.
    /// Idempotent; refreshes images on every call.
    pub async fn provision(&self, color: Color, traffic: Traffic) -> Result<(), ProvisionError> {
        let project = self.config.app.project(color);
        tracing::info!(
            %color,
            %project,
            enabled = traffic.is_enabled(),
            priority = %traffic.priority(),
            "provisioning stack"
        );
        self.compose
            .up(&project, &self.environment(color, traffic))
            .await
    }

    /// Stop and remove every resource of `color`. Idempotent.
    pub async fn shutdown(&self, color: Color) -> Result<(), ProvisionError> {
        let project = self.config.app.project(color);
        tracing::info!(%color, %project, "stopping stack");
        self.compose.down(&project).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::{Call, FakeRuntime};

    #[test]
    fn disabled_traffic_carries_zero_priority() {
        let config = Config::default();
        let runtime = FakeRuntime::new(&config);
        let controller = StackController::new(&runtime, &config);

        let env = controller.environment(Color::Green, Traffic::Disabled);
        assert_eq!(env[ENV_COLOR], "green");
        assert_eq!(env[ENV_TRAFFIC_ENABLED], "false");
        assert_eq!(env[ENV_PRIORITY], "0");
        assert_eq!(env["COMPOSE_PROJECT_NAME"], "app-green");
    }

    #[test]
    fn enabled_traffic_uses_configured_marker() {
        let config = Config {
            traffic_value: "yes".to_string(),
            ..Config::default()
        };
        let runtime = FakeRuntime::new(&config);
        let controller = StackController::new(&runtime, &config);

        let env = controller.environment(Color::Blue, Traffic::Enabled(Priority::new(99)));
        assert_eq!(env[ENV_TRAFFIC_ENABLED], "yes");
        assert_eq!(env[ENV_PRIORITY], "99");
    }

    #[tokio::test]
    async fn provision_then_shutdown() {
        let config = Config::default();
        let runtime = FakeRuntime::new(&config);
        let controller = StackController::new(&runtime, &config);

        controller
            .provision(Color::Blue, Traffic::Enabled(Priority::new(5)))
            .await
            .unwrap();
        assert!(runtime.is_enabled(Color::Blue));

        controller.shutdown(Color::Blue).await.unwrap();
        controller.shutdown(Color::Blue).await.unwrap();
        assert!(!runtime.is_running(Color::Blue));

        assert_eq!(
            runtime.calls(),
            vec![
                Call::Up {
                    project: "app-blue".to_string(),
                    enabled: true,
                    priority: 5,
                },
                Call::Down {
                    project: "app-blue".to_string(),
                },
                Call::Down {
                    project: "app-blue".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn provision_failure_is_reported() {
        let config = Config::default();
        let runtime = FakeRuntime::new(&config);
        runtime.fail_up(Color::Green, 1);
        let controller = StackController::new(&runtime, &config);

        let err = controller
            .provision(Color::Green, Traffic::Disabled)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Failed { .. }));
        assert!(!runtime.is_running(Color::Green));
    }
}
