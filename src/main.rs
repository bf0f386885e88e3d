// ABOUTME: Entry point for the bluegreen CLI application.
// ABOUTME: Resolves configuration, connects to the runtime and runs one action under the deploy lock.

mod cli;

use bluegreen::config::Config;
use bluegreen::deploy::{self, Action, DeployError, DeployLock, Orchestrator, Outcome};
use bluegreen::diagnostics::{Diagnostics, Warning};
use bluegreen::error::{Error, Result};
use bluegreen::output::{Output, OutputMode};
use bluegreen::runtime::{ComposeCli, connect_local};
use bluegreen::watch::{self, HttpFetcher};
use clap::Parser;
use cli::{Cli, WatchArgs};
use std::env;
use std::future::Future;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_flags(cli.quiet, cli.json);

    // RUST_LOG wins; otherwise follow the verbosity flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else if mode == OutputMode::Normal {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(mode);
    let result = match cli.action.action() {
        Some(action) => run(&cli, action, &mut output).await,
        None => watch(&cli.watch, &output).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "run failed");
            output.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, action: Action, output: &mut Output) -> Result<ExitCode> {
    let cwd = env::current_dir()?;
    let mut config = Config::resolve(&cwd, cli.config.as_deref())?;
    if cli.skip_health {
        config.skip_health = true;
    }
    if cli.yes {
        config.auto_confirm = true;
    }

    output.start_timer();
    let (runtime, info) = connect_local(&config.runtime_config()).await?;
    output.progress(&format!(
        "Using {} at {}",
        info.runtime_type, info.socket_path
    ));

    let compose = ComposeCli::new(info.runtime_type)
        .host(&info.socket_path)
        .compose_file(config.compose_file.clone())
        .pull_policy(config.pull_policy.clone())
        .timeout(config.compose_timeout);
    let orchestrator = Orchestrator::new(&runtime, &compose, &config);
    let mut diag = Diagnostics::default();

    let outcome = if action.mutates() {
        let dir = deploy::state_dir()?;
        output.progress(&format!("Acquiring deploy lock for {}...", config.app));
        DeployLock::with_lock(
            &dir,
            &config.app,
            cli.force,
            &mut diag,
            interruptible(orchestrator.run(action)),
        )
        .await
    } else {
        interruptible(orchestrator.run(action)).await
    };

    match &outcome {
        Ok(Outcome::Status(snapshot)) => diag.check_snapshot(snapshot),
        Err(Error::Interrupted) => diag.warn(Warning::interrupted(
            "stacks were left as the last completed provisioning step made them; rerun to converge",
        )),
        _ => {}
    }

    for warning in diag.warnings() {
        output.warning(warning);
    }

    output.outcome(&outcome?);
    Ok(ExitCode::SUCCESS)
}

/// Poll the endpoint until the count is reached or Ctrl-C. Succeeds when
/// any request got an answer.
async fn watch(args: &WatchArgs, output: &Output) -> Result<ExitCode> {
    let settings = args.settings();
    let fetcher = HttpFetcher::new(&settings)?;
    tracing::debug!(url = %settings.url, "watching endpoint");

    let stop = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let summary = watch::watch(&fetcher, &settings, stop, |tick| output.request(tick)).await;
    output.watch_summary(&summary);

    Ok(if summary.any_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Stop waiting on Ctrl-C. Dropping the operation kills any running compose
/// child and cancels the health probe.
async fn interruptible<F>(operation: F) -> Result<Outcome>
where
    F: Future<Output = std::result::Result<Outcome, DeployError>>,
{
    tokio::select! {
        result = operation => result.map_err(Error::from),
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted),
    }
}
