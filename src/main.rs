use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use tracing::{debug, error, info, warn};

use stepbot::config::{self as cfg, Config};
use stepbot::executor::ActionExecutor;
use stepbot::provider::DesktopProvider;

/// Stepbot CLI
#[derive(Debug, Parser)]
#[command(
    name = stepbot::PKG_NAME,
    version = stepbot::PKG_VERSION,
    about = "Run validated keyboard, text, command and delay actions"
)]
struct Args {
    /// Path to the JSON configuration file (built-in demo actions when omitted)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Override the number of runs from the configuration
    #[arg(short = 'n', long = "runs")]
    runs: Option<u32>,

    /// Enable dry-run mode (log actions instead of simulating input)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.log_level.as_deref() {
        Some(level) => stepbot::init_tracing_with_level(
            stepbot::parse_level(level).unwrap_or(tracing::Level::INFO),
        ),
        None => stepbot::init_tracing(),
    }

    if args.print_schema {
        let schema = cfg::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => cfg::load_from_path_async(path).await?,
        None => {
            debug!(target: "stepbot", "No --config given; using built-in demo actions");
            Config::demo()
        }
    };
    if let Some(runs) = args.runs {
        config.runs = runs;
        cfg::validate_config(&config)?;
    }

    info!(
        version = stepbot::PKG_VERSION,
        runs = config.runs,
        actions = config.actions.len(),
        dry_run = args.dry_run,
        "Starting Stepbot"
    );
    if config.actions.is_empty() {
        warn!("No actions configured; nothing to do.");
    }

    let executor = ActionExecutor::new(Arc::new(DesktopProvider::new(args.dry_run)));
    let mut tally = Tally::default();

    tokio::select! {
        _ = run_all(&executor, &config, &mut tally) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    info!(
        succeeded = tally.succeeded,
        failed = tally.failed,
        "Stepbot finished"
    );
    if tally.failed > 0 {
        bail!("Engine unstable: {} action execution(s) failed", tally.failed);
    }
    info!("Engine stable");
    Ok(())
}

async fn run_all(executor: &ActionExecutor, config: &Config, tally: &mut Tally) {
    let pause = Duration::from_millis(config.pause_between_runs_ms);
    for run in 1..=config.runs {
        info!(run, total = config.runs, "Run started");
        for action in &config.actions {
            let id = action.get("id").and_then(|v| v.as_str()).unwrap_or("<invalid>");
            let result = executor.execute_value(action).await;
            if result.success {
                tally.succeeded += 1;
                info!(run, %id, elapsed_ms = result.execution_time_ms(), "Action completed");
            } else {
                tally.failed += 1;
                error!(
                    run, %id,
                    elapsed_ms = result.execution_time_ms(),
                    error = result.error.as_deref().unwrap_or_default(),
                    "Action failed"
                );
            }
        }
        if run < config.runs && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}
