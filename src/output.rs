// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::Outcome;
use crate::diagnostics::{Warning, WarningKind};
use crate::inspect::{Snapshot, StackStatus};
use crate::watch::{Tick, WatchSummary};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

impl OutputMode {
    /// `--json` wins over `--quiet`.
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        match (quiet, json) {
            (_, true) => OutputMode::Json,
            (true, false) => OutputMode::Quiet,
            (false, false) => OutputMode::Normal,
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, warning: &Warning) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Warning [{}]: {}", warning.kind, warning.message)
            }
            OutputMode::Json => emit_err(&JsonEvent {
                event: "warning",
                message: &warning.message,
                kind: Some(warning.kind),
                ..Default::default()
            }),
        }
    }

    /// One polled request. Failures go to stderr; quiet mode prints only failures.
    pub fn request(&self, tick: &Tick) {
        match self.mode {
            OutputMode::Normal if !tick.is_error() => println!("{tick}"),
            OutputMode::Normal | OutputMode::Quiet if tick.is_error() => eprintln!("{tick}"),
            OutputMode::Normal | OutputMode::Quiet => {}
            OutputMode::Json => emit_out(&JsonEvent {
                event: "request",
                message: "",
                tick: Some(tick),
                ..Default::default()
            }),
        }
    }

    /// Totals after a watch ends.
    pub fn watch_summary(&self, summary: &WatchSummary) {
        let message = summary.to_string();
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                if summary.interrupted && self.mode == OutputMode::Normal {
                    println!("Interrupted.");
                }
                println!("{message}");
            }
            OutputMode::Json => emit_out(&JsonEvent {
                event: "summary",
                message: &message,
                duration_secs: Some(summary.elapsed.as_secs_f64()),
                summary: Some(summary),
                ..Default::default()
            }),
        }
    }

    /// Print the result of a successful operation.
    pub fn outcome(&self, outcome: &Outcome) {
        let message = outcome.to_string();
        match self.mode {
            OutputMode::Normal => {
                if let Outcome::Status(snapshot) = outcome {
                    print!("{}", render_status(snapshot));
                    return;
                }
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => emit_out(&JsonEvent {
                event: "success",
                message: &message,
                duration_secs: self.duration(),
                outcome: Some(outcome),
                ..Default::default()
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => emit_err(&JsonEvent {
                event: "error",
                message,
                duration_secs: self.duration(),
                ..Default::default()
            }),
        }
    }
}

fn render_stack(status: &StackStatus) -> String {
    if !status.running {
        return format!("{:<6} stopped\n", status.color.as_str());
    }
    let traffic = if status.traffic_enabled {
        "enabled"
    } else {
        "disabled"
    };
    let priority = status
        .priority
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let container = status
        .container
        .as_ref()
        .map(|c| c.short().to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<6} running  traffic={traffic} priority={priority} container={container}\n",
        status.color.as_str()
    )
}

/// Two-line status table plus the live color.
pub fn render_status(snapshot: &Snapshot) -> String {
    let live = snapshot
        .live
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "{}{}live   {live}\n",
        render_stack(&snapshot.blue),
        render_stack(&snapshot.green)
    )
}

fn emit_out(event: &JsonEvent<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

fn emit_err(event: &JsonEvent<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        eprintln!("{json}");
    }
}

#[derive(Default, Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<WarningKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<&'a Tick>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a WatchSummary>,
}
