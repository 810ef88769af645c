//! txchaos: echo transactions against a database while its return traffic is
//! being dropped, and count what comes back.
//!
//! Exit codes:
//! - 0: the run completed (whatever the counts, unless `--fail-on-violation`)
//! - 1: sequencing failed, a worker hit a fatal failure, or violations were
//!   found with `--fail-on-violation`
//! - 2: the configuration is invalid

mod commands;
mod format;
mod parse;

use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use txchaos_concurrency::CancellationSignal;
use txchaos_core::{FailureKind, TransactionError};
use txchaos_engine::{spawn_interrupt_listener, Harness, TracingReporter};
use txchaos_executor::{IptablesFaultController, PostgresExecutor};

use commands::build_cli;
use format::{format_error, format_report, OutputMode};
use parse::{matches_to_action, CliAction};

const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 2;

fn main() {
    init_logging();
    let matches = build_cli().get_matches();

    let cwd = std::env::current_dir().unwrap_or_default();
    let action = match matches_to_action(&matches, &cwd) {
        Ok(action) => action,
        Err(e) => {
            let mode = if matches.get_flag("json") {
                OutputMode::Json
            } else {
                OutputMode::Human
            };
            eprintln!("{}", format_error(&anyhow::Error::new(e), mode));
            process::exit(EXIT_CONFIG);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("(error) failed to start runtime: {}", e);
            process::exit(EXIT_FAILURE);
        }
    };

    let mode = action.output;
    let fail_on_violation = action.fail_on_violation;

    // The pool spawns its maintenance tasks, so it is built inside the runtime.
    let executor = match runtime.block_on(async { PostgresExecutor::from_config(&action.config) }) {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            let code = setup_exit_code(&e);
            let err = anyhow::Error::new(e).context("failed to set up the database executor");
            eprintln!("{}", format_error(&err, mode));
            process::exit(code);
        }
    };

    match runtime.block_on(run(action, executor)) {
        Ok(report) => {
            println!("{}", format_report(&report, mode));
            if fail_on_violation && report.has_correctness_violations() {
                process::exit(EXIT_FAILURE);
            }
        }
        Err(e) => {
            error!(target: "txchaos::cli", error = %format!("{:#}", e), "run failed");
            eprintln!("{}", format_error(&e, mode));
            process::exit(EXIT_FAILURE);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("txchaos=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Exit code for an executor that could not be built.
fn setup_exit_code(err: &TransactionError) -> i32 {
    match err.kind() {
        FailureKind::Configuration => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

async fn run(
    action: CliAction,
    executor: Arc<PostgresExecutor>,
) -> anyhow::Result<txchaos_engine::RunReport> {
    let CliAction {
        config,
        config_path,
        ..
    } = action;
    info!(
        target: "txchaos::cli",
        config = ?config_path,
        workers = config.workers,
        mode = ?config.run_mode(),
        drop_probability = config.drop_probability,
        "starting run"
    );

    let faults = Arc::new(IptablesFaultController::new(&config.faults));

    let signal = CancellationSignal::new();
    let listener = spawn_interrupt_listener(signal.clone(), config.interrupt);

    let harness = Harness::new(config, executor.clone(), faults, Arc::new(TracingReporter));
    let result = harness.run(signal.clone()).await;

    // Sequencing failures return before the workload sets the signal.
    signal.cancel(txchaos_concurrency::StopReason::Completed);
    let _ = listener.await;
    executor.close().await;

    Ok(result?)
}
