// ABOUTME: Capability traits at the container runtime boundary.
// ABOUTME: Defines InspectOps, ExecOps and ComposeOps.

mod compose;
mod exec;
mod inspect;
pub(crate) mod sealed;

pub use compose::{ComposeOps, ProvisionError};
pub use exec::{ExecError, ExecOps, ExecResult};
pub use inspect::{
    COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL, ContainerFilters, ContainerSummary, InspectError,
    InspectOps,
};
