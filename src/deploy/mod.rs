// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the orchestrator, switch states, deploy lock and error taxonomy.

mod confirm;
mod error;
mod lock;
mod orchestrator;
mod state;
mod switch;

pub use confirm::{Confirm, ConfirmMode};
pub use error::{DeployError, DeployErrorKind};
pub use lock::{DeployLock, LockInfo, state_dir};
pub use orchestrator::{Action, Orchestrator, Outcome};
pub use state::{Completed, Promoted, Provisioned, Validated};
pub use switch::Switch;
