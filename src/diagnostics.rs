// ABOUTME: Non-fatal findings collected while an action runs.
// ABOUTME: They never change the exit code; the CLI prints them after the outcome is known.

use serde::Serialize;
use std::fmt;

use crate::inspect::Snapshot;

/// Warnings gathered over one invocation, in the order they were raised.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning. It is logged immediately and kept for the final report.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = %warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Flag a snapshot in which the router sees two enabled candidates.
    pub fn check_snapshot(&mut self, snapshot: &Snapshot) {
        if snapshot.blue.traffic_enabled && snapshot.green.traffic_enabled {
            self.warn(Warning::new(
                WarningKind::SplitTraffic,
                "both colors are marked traffic-enabled; run deploy or rollback to converge",
            ));
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The lock file could not be removed after the action finished.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LockRelease, message)
    }

    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Interrupted, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// A stale lock file may remain and will block until it ages out.
    LockRelease,
    /// Both colors are enabled; the router arbitrates by priority.
    SplitTraffic,
    /// Stacks are as the last completed provisioning call left them.
    Interrupted,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::LockRelease => "lock-release",
            WarningKind::SplitTraffic => "split-traffic",
            WarningKind::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::StackStatus;
    use crate::types::{Color, Priority};

    fn enabled(color: Color, enabled: bool) -> StackStatus {
        StackStatus {
            color,
            running: true,
            traffic_enabled: enabled,
            priority: Some(Priority::new(1)),
            container: None,
        }
    }

    #[test]
    fn warnings_keep_their_order() {
        let mut diag = Diagnostics::default();
        assert!(!diag.has_warnings());

        diag.warn(Warning::lock_release("failed to remove lock file"));
        diag.warn(Warning::interrupted("ctrl-c during health check"));

        let kinds: Vec<_> = diag.warnings().iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::LockRelease, WarningKind::Interrupted]);
    }

    #[test]
    fn split_traffic_is_flagged_only_when_both_colors_are_enabled() {
        let mut diag = Diagnostics::default();
        diag.check_snapshot(&Snapshot {
            blue: enabled(Color::Blue, true),
            green: enabled(Color::Green, false),
            live: Some(Color::Blue),
        });
        assert!(!diag.has_warnings());

        diag.check_snapshot(&Snapshot {
            blue: enabled(Color::Blue, true),
            green: enabled(Color::Green, true),
            live: Some(Color::Blue),
        });
        assert_eq!(diag.warnings()[0].kind, WarningKind::SplitTraffic);
    }

    #[test]
    fn kind_codes_match_serialized_form() {
        for kind in [
            WarningKind::LockRelease,
            WarningKind::SplitTraffic,
            WarningKind::Interrupted,
        ] {
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.as_str().to_string())
            );
        }
    }
}
