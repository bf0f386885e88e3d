// ABOUTME: Deployment orchestrator: bootstrap, switch, rollback, shutdown and status.
// ABOUTME: State is re-derived from the runtime at the start of every operation.

use std::fmt;

use serde::Serialize;

use crate::config::Config;
use crate::health::{HealthProber, ProbeSettings};
use crate::inspect::{Inspector, Snapshot};
use crate::runtime::{ComposeOps, ExecOps, InspectOps};
use crate::stack::{StackController, Traffic};
use crate::types::{Color, Priority, PriorityGenerator};

use super::confirm::{Confirm, ConfirmMode};
use super::error::DeployError;
use super::state::Provisioned;
use super::switch::Switch;

/// Operation selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Bootstrap blue, or switch traffic to the idle color.
    #[default]
    Deploy,
    /// Disable and remove both colors.
    Shutdown,
    /// Give traffic back to the previously live color.
    Rollback,
    /// Show both colors without changing anything.
    Status,
}

impl Action {
    /// Whether the action changes runtime state and must hold the deploy lock.
    pub fn mutates(self) -> bool {
        !matches!(self, Action::Status)
    }
}

/// What a successful operation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Bootstrapped {
        live: Color,
        priority: Priority,
    },
    Switched {
        from: Color,
        to: Color,
        priority: Priority,
        probe_attempts: u32,
        health_skipped: bool,
    },
    RolledBack {
        from: Color,
        to: Color,
        priority: Priority,
    },
    ShutDown,
    Status(Snapshot),
}

impl Outcome {
    /// Live color once the operation finished.
    pub fn live(&self) -> Option<Color> {
        match self {
            Outcome::Bootstrapped { live, .. } => Some(*live),
            Outcome::Switched { to, .. } | Outcome::RolledBack { to, .. } => Some(*to),
            Outcome::ShutDown => None,
            Outcome::Status(snapshot) => snapshot.live,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Bootstrapped { live, priority } => {
                write!(f, "Bootstrapped: {live} is live (priority {priority})")
            }
            Outcome::Switched {
                from, to, priority, ..
            } => write!(
                f,
                "Switched traffic from {from} to {to} (priority {priority}); {from} kept running for rollback"
            ),
            Outcome::RolledBack { from, to, priority } => {
                write!(f, "Rolled back from {from} to {to} (priority {priority})")
            }
            Outcome::ShutDown => write!(f, "Shut down both colors"),
            Outcome::Status(snapshot) => match snapshot.live {
                Some(live) => write!(f, "Live: {live}"),
                None => write!(f, "Live: none"),
            },
        }
    }
}

/// Ties inspection, provisioning and the health gate into the four actions.
///
/// `runtime` answers inspection and exec; `compose` provisions stacks. In the
/// binary these are the API client and the compose CLI respectively.
pub struct Orchestrator<'a, R, C> {
    runtime: &'a R,
    compose: &'a C,
    config: &'a Config,
    priorities: PriorityGenerator,
    confirm: Box<dyn Confirm + 'a>,
}

impl<'a, R, C> Orchestrator<'a, R, C>
where
    R: InspectOps + ExecOps,
    C: ComposeOps,
{
    pub fn new(runtime: &'a R, compose: &'a C, config: &'a Config) -> Self {
        Self {
            runtime,
            compose,
            config,
            priorities: PriorityGenerator::new(),
            confirm: Box::new(ConfirmMode::from_auto(config.auto_confirm)),
        }
    }

    pub fn with_priorities(mut self, priorities: PriorityGenerator) -> Self {
        self.priorities = priorities;
        self
    }

    pub fn with_confirm(mut self, confirm: impl Confirm + 'a) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    fn inspector(&self) -> Inspector<'a, R> {
        Inspector::new(self.runtime, self.config)
    }

    fn controller(&self) -> StackController<'a, C> {
        StackController::new(self.compose, self.config)
    }

    pub async fn run(&self, action: Action) -> Result<Outcome, DeployError> {
        match action {
            Action::Deploy => self.deploy().await,
            Action::Shutdown => self.shutdown().await,
            Action::Rollback => self.rollback().await,
            Action::Status => Ok(Outcome::Status(self.inspector().snapshot().await?)),
        }
    }

    /// Bootstrap when nothing is live, otherwise switch to the idle color.
    pub async fn deploy(&self) -> Result<Outcome, DeployError> {
        match self.inspector().live_color().await? {
            None => self.bootstrap().await,
            Some(live) => self.switch(live).await,
        }
    }

    /// First deployment: blue goes live directly. There is no previous stack
    /// to protect, so there is no health gate.
    async fn bootstrap(&self) -> Result<Outcome, DeployError> {
        let color = Color::FIRST;
        tracing::info!(%color, "no live color, bootstrapping");

        let priority = self.priorities.next();
        self.controller()
            .provision(color, Traffic::Enabled(priority))
            .await?;

        Ok(Outcome::Bootstrapped {
            live: color,
            priority,
        })
    }

    async fn switch(&self, live: Color) -> Result<Outcome, DeployError> {
        let controller = self.controller();
        let prober = HealthProber::new(self.runtime, self.config);
        let settings = ProbeSettings::from_config(self.config);
        tracing::info!(live = %live, new = %live.other(), "switching colors");

        let switch = Switch::<Provisioned>::provision(&controller, live).await?;
        let switch = switch.validate(&prober, &settings).await?;
        tracing::info!(
            color = %switch.new_color(),
            attempts = switch.probe().attempts,
            skipped = switch.probe().skipped,
            "health gate passed"
        );

        if !self.confirm.confirm(switch.new_color(), live).await {
            tracing::warn!(new = %switch.new_color(), "promotion declined, leaving it idle");
            return Err(DeployError::NotConfirmed(switch.new_color()));
        }

        let switch = switch.promote(&controller, &self.priorities).await?;
        tracing::info!(color = %switch.new_color(), priority = %switch.priority(), "traffic enabled");
        let switch = switch.demote_old(&controller).await?;
        tracing::info!(color = %switch.old(), "traffic disabled, stack kept running");

        let (to, priority, probe) = switch.finish();
        Ok(Outcome::Switched {
            from: live,
            to,
            priority,
            probe_attempts: probe.attempts,
            health_skipped: probe.skipped,
        })
    }

    /// Re-enable the non-live color without a health gate; it was live
    /// before and is presumed healthy.
    pub async fn rollback(&self) -> Result<Outcome, DeployError> {
        let snapshot = self.inspector().snapshot().await?;

        let Some(live) = snapshot.live else {
            return Err(DeployError::InvalidRollbackTarget(
                "no color is live, nothing to roll back from".to_string(),
            ));
        };
        let target = live.other();
        if !snapshot.get(target).running {
            return Err(DeployError::InvalidRollbackTarget(format!(
                "{target} stack is not running, nothing to roll back to"
            )));
        }

        tracing::info!(from = %live, to = %target, "rolling back");
        let controller = self.controller();
        let priority = self.priorities.next();
        controller
            .provision(target, Traffic::Enabled(priority))
            .await?;
        controller.provision(live, Traffic::Disabled).await?;

        Ok(Outcome::RolledBack {
            from: live,
            to: target,
            priority,
        })
    }

    /// Disable both colors, then stop and remove them. Runs regardless of
    /// the current state.
    pub async fn shutdown(&self) -> Result<Outcome, DeployError> {
        let controller = self.controller();
        for color in Color::ALL {
            controller.provision(color, Traffic::Disabled).await?;
        }
        for color in Color::ALL {
            controller.shutdown(color).await?;
        }
        tracing::info!("both colors shut down");
        Ok(Outcome::ShutDown)
    }
}
