// ABOUTME: Generic switch struct parameterized by state marker.
// ABOUTME: Each transition consumes self, so traffic moves only in the safe order.

use crate::health::{HealthProber, ProbeReport, ProbeSettings};
use crate::runtime::{ComposeOps, ExecOps, InspectOps};
use crate::stack::{StackController, Traffic};
use crate::types::{Color, Priority, PriorityGenerator};

use super::error::DeployError;
use super::state::{Completed, Promoted, Provisioned, Validated};

/// A traffic switch from the live color to its counterpart, parameterized by
/// how far it has progressed.
///
/// The order is fixed by the types: the new color is validated before it is
/// enabled, and the old color is disabled only after the new one is enabled,
/// so the router always has at least one enabled candidate.
#[derive(Debug)]
pub struct Switch<S> {
    old: Color,
    new: Color,
    state: S,
}

impl<S> Switch<S> {
    /// Color that was live when the switch started.
    pub fn old(&self) -> Color {
        self.old
    }

    /// Color being promoted.
    pub fn new_color(&self) -> Color {
        self.new
    }

    fn transition<T>(self, state: T) -> Switch<T> {
        Switch {
            old: self.old,
            new: self.new,
            state,
        }
    }
}

impl Switch<Provisioned> {
    /// Bring up the idle counterpart of `live` with traffic disabled.
    #[must_use = "switch state must be used"]
    pub async fn provision<C: ComposeOps>(
        controller: &StackController<'_, C>,
        live: Color,
    ) -> Result<Self, DeployError> {
        let new = live.other();
        controller.provision(new, Traffic::Disabled).await?;
        Ok(Switch {
            old: live,
            new,
            state: Provisioned,
        })
    }

    /// Run the health gate against the new color.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::HealthCheckTimeout` if the new color never
    /// answers. Traffic is untouched and the new color is left running.
    #[must_use = "switch state must be used"]
    pub async fn validate<R: InspectOps + ExecOps>(
        self,
        prober: &HealthProber<'_, R>,
        settings: &ProbeSettings,
    ) -> Result<Switch<Validated>, DeployError> {
        let probe = prober.await_healthy(self.new, settings).await;
        if !probe.healthy {
            return Err(DeployError::HealthCheckTimeout {
                color: self.new,
                timeout: settings.timeout,
                attempts: probe.attempts,
            });
        }
        Ok(self.transition(Validated { probe }))
    }
}

impl Switch<Validated> {
    pub fn probe(&self) -> &ProbeReport {
        &self.state.probe
    }

    /// Enable traffic on the new color with a priority above every earlier one.
    #[must_use = "switch state must be used"]
    pub async fn promote<C: ComposeOps>(
        self,
        controller: &StackController<'_, C>,
        priorities: &PriorityGenerator,
    ) -> Result<Switch<Promoted>, DeployError> {
        let priority = priorities.next();
        controller
            .provision(self.new, Traffic::Enabled(priority))
            .await?;
        let probe = self.state.probe;
        Ok(self.transition(Promoted { probe, priority }))
    }
}

impl Switch<Promoted> {
    pub fn priority(&self) -> Priority {
        self.state.priority
    }

    /// Disable traffic on the old color. Its containers keep running.
    #[must_use = "switch state must be used"]
    pub async fn demote_old<C: ComposeOps>(
        self,
        controller: &StackController<'_, C>,
    ) -> Result<Switch<Completed>, DeployError> {
        controller.provision(self.old, Traffic::Disabled).await?;
        let Promoted { probe, priority } = self.state;
        Ok(self.transition(Completed { probe, priority }))
    }
}

impl Switch<Completed> {
    /// New live color, its priority and the health gate report.
    pub fn finish(self) -> (Color, Priority, ProbeReport) {
        (self.new, self.state.priority, self.state.probe)
    }
}
