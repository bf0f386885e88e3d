// ABOUTME: Health prober: polls a color's health endpoint from inside its container.
// ABOUTME: Timeout-bounded retry loop on tokio time, cancellable by dropping the future.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::inspect::Inspector;
use crate::runtime::{ExecOps, InspectOps};
use crate::types::Color;

/// Probe parameters for one health gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Command run inside the service container; exit 0 means healthy.
    pub command: Vec<String>,
    pub timeout: Duration,
    pub interval: Duration,
    pub attempt_timeout: Duration,
    /// Trusted-deploy mode: report healthy without probing.
    pub skip: bool,
}

impl ProbeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: config.health_command(),
            timeout: config.health_timeout,
            interval: config.health_interval,
            attempt_timeout: config.health_attempt_timeout,
            skip: config.skip_health,
        }
    }
}

/// Outcome of a health gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub healthy: bool,
    pub attempts: u32,
    pub elapsed: Duration,
    pub skipped: bool,
}

pub struct HealthProber<'a, R> {
    runtime: &'a R,
    inspector: Inspector<'a, R>,
}

impl<'a, R: InspectOps + ExecOps> HealthProber<'a, R> {
    pub fn new(runtime: &'a R, config: &'a Config) -> Self {
        Self {
            runtime,
            inspector: Inspector::new(runtime, config),
        }
    }

    /// Poll until the first successful probe or until `timeout` has elapsed.
    pub async fn await_healthy(&self, color: Color, settings: &ProbeSettings) -> ProbeReport {
        if settings.skip {
            tracing::info!(%color, "health check skipped");
            return ProbeReport {
                healthy: true,
                attempts: 0,
                elapsed: Duration::ZERO,
                skipped: true,
            };
        }

        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let healthy = self.attempt(color, settings).await;
            let elapsed = start.elapsed();

            if healthy {
                tracing::info!(%color, attempts, elapsed_ms = elapsed.as_millis() as u64, "health check passed");
                return ProbeReport {
                    healthy: true,
                    attempts,
                    elapsed,
                    skipped: false,
                };
            }

            if elapsed >= settings.timeout {
                tracing::warn!(%color, attempts, timeout_secs = settings.timeout.as_secs(), "health check timed out");
                return ProbeReport {
                    healthy: false,
                    attempts,
                    elapsed,
                    skipped: false,
                };
            }

            let remaining = settings.timeout - elapsed;
            tokio::time::sleep(settings.interval.min(remaining)).await;
        }
    }

    /// One probe. Every failure mode, including a container that cannot be
    /// resolved yet, is just an unhealthy attempt.
    async fn attempt(&self, color: Color, settings: &ProbeSettings) -> bool {
        let container = match self.inspector.service_container_id(color).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::debug!(%color, "service container not running yet");
                return false;
            }
            Err(e) => {
                tracing::debug!(%color, "could not resolve service container: {}", e);
                return false;
            }
        };

        let exec = tokio::time::timeout(
            settings.attempt_timeout,
            self.runtime.exec(&container, &settings.command),
        )
        .await;

        match exec {
            Ok(Ok(result)) if result.success() => true,
            Ok(Ok(result)) => {
                tracing::debug!(%color, exit_code = result.exit_code, stderr = %result.stderr_text(), "probe failed");
                false
            }
            Ok(Err(e)) => {
                tracing::debug!(%color, "probe exec failed: {}", e);
                false
            }
            Err(_elapsed) => {
                tracing::debug!(%color, "probe attempt timed out");
                false
            }
        }
    }
}
