// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: One positional action plus flags that override the layered configuration.

use clap::{Args, Parser, ValueEnum};
use hyper::Uri;
use hyper::header::{HeaderName, HeaderValue};
use std::path::PathBuf;
use std::time::Duration;

use bluegreen::deploy::Action;
use bluegreen::watch::{self, WatchSettings};

#[derive(Parser)]
#[command(name = "bluegreen")]
#[command(about = "Blue/green deployment switching for compose stacks behind a label-driven router")]
#[command(version)]
pub struct Cli {
    /// Operation to run
    #[arg(value_enum, default_value_t = Command::Deploy)]
    pub action: Command,

    /// Promote without running the health gate (trusted deploy)
    #[arg(long)]
    pub skip_health: bool,

    /// Promote without asking for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Break an existing deploy lock
    #[arg(long)]
    pub force: bool,

    /// Configuration file (default: bluegreen.yml in the working directory)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print the final result
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print JSON events instead of text
    #[arg(long)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub watch: WatchArgs,
}

/// Positional action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Command {
    /// Bootstrap, or switch traffic to the idle color
    Deploy,
    /// Disable and remove both colors
    Shutdown,
    /// Re-enable the previous color
    Rollback,
    /// Show both colors and the live one
    Status,
    /// Poll an endpoint to observe a switch from outside
    Watch,
}

impl Command {
    /// The orchestrated action, or `None` for `watch`, which never touches the runtime.
    pub fn action(self) -> Option<Action> {
        match self {
            Command::Deploy => Some(Action::Deploy),
            Command::Shutdown => Some(Action::Shutdown),
            Command::Rollback => Some(Action::Rollback),
            Command::Status => Some(Action::Status),
            Command::Watch => None,
        }
    }
}

#[derive(Args)]
#[command(next_help_heading = "Watch")]
pub struct WatchArgs {
    /// Endpoint to poll
    #[arg(long, value_name = "URL", default_value = watch::DEFAULT_URL, value_parser = watch::parse_url)]
    pub url: Uri,

    /// Seconds between requests; 0 runs them back to back
    #[arg(long, value_name = "SECONDS", default_value = "0.5", value_parser = watch::parse_interval)]
    pub interval: Duration,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value = "1", value_parser = watch::parse_timeout)]
    pub timeout: Duration,

    /// Stop after N requests; 0 runs until Ctrl-C
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub count: u64,

    /// Extra request header; repeatable
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = watch::parse_header)]
    pub headers: Vec<(HeaderName, HeaderValue)>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Print bodies verbatim instead of compacting JSON
    #[arg(long)]
    pub raw: bool,
}

impl WatchArgs {
    pub fn settings(&self) -> WatchSettings {
        WatchSettings {
            url: self.url.clone(),
            interval: self.interval,
            timeout: self.timeout,
            count: (self.count > 0).then_some(self.count),
            headers: self.headers.clone(),
            insecure: self.insecure,
            raw: self.raw,
        }
    }
}
