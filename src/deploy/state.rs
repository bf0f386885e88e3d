// ABOUTME: Switch state marker types for the type state pattern.
// ABOUTME: States carry the data gathered so far, so later steps cannot run early.

use crate::health::ProbeReport;
use crate::types::Priority;

/// New color is running with traffic disabled.
/// Available actions: `validate()`
#[derive(Debug, Clone, Copy)]
pub struct Provisioned;

/// New color passed its health gate (or the gate was skipped).
/// Available actions: `promote()`
#[derive(Debug, Clone, Copy)]
pub struct Validated {
    pub(crate) probe: ProbeReport,
}

/// New color is traffic-enabled with a fresh priority; old color still enabled.
/// Available actions: `demote_old()`
#[derive(Debug, Clone, Copy)]
pub struct Promoted {
    pub(crate) probe: ProbeReport,
    pub(crate) priority: Priority,
}

/// Old color demoted to idle. The switch is done.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy)]
pub struct Completed {
    pub(crate) probe: ProbeReport,
    pub(crate) priority: Priority,
}
