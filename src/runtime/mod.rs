// ABOUTME: Container runtime boundary: detection, API client, compose driver.
// ABOUTME: Capability traits let the orchestrator run against any runtime.

mod bollard;
mod compose;
mod detection;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use compose::{ComposeCli, DEFAULT_COMPOSE_TIMEOUT, DEFAULT_PULL_POLICY};
pub use detection::{DetectionError, detect_local};
pub use error::{ConnectError, RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};

/// Detect the local runtime and open both halves of it: the API client used
/// for inspection and exec, and the compose driver used for provisioning.
pub async fn connect_local(
    config: &RuntimeConfig,
) -> Result<(BollardRuntime, RuntimeInfo), RuntimeError> {
    let info = detect_local(config)?;
    let runtime = BollardRuntime::connect(&info).await?;
    Ok((runtime, info))
}
