//! handle-checker: batch availability checks for account handles.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use chrono::Utc;
use checker_core::RunStats;
use checker_engine::{read_records, CancelToken, HttpProbe, RunHandle};
use checker_logging::{checker_error, checker_info, checker_warn, level_for, LogDestination};
use clap::Parser;

mod cli;
mod config;
mod progress;

use cli::Cli;
use config::AppConfig;

/// Conventional exit status for a run stopped by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let destination = match &cli.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    checker_logging::initialize(destination, level_for(cli.verbose));

    match run(&cli) {
        Ok(stats) if stats.cancelled > 0 => ExitCode::from(EXIT_INTERRUPTED),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            checker_error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<RunStats> {
    let config = AppConfig::resolve(cli)?;
    let records = read_records(&cli.input, cli.key_column.as_deref())
        .with_context(|| format!("failed to load handles from {}", cli.input.display()))?;
    checker_info!("Loaded {} handle(s) from {:?}", records.len(), cli.input);

    let probe = HttpProbe::new(config.probe).context("invalid probe settings")?;
    let handle = RunHandle::start(records, Arc::new(probe), config.run)?;
    watch_ctrl_c(handle.cancel_token())?;

    progress::follow(&handle, cli.verbose);

    // The found-set is written even when the run was cancelled or failed.
    let found_path = cli.output.clone().unwrap_or_else(default_found_path);
    let found = handle
        .download_found(&found_path)
        .with_context(|| format!("failed to write {}", found_path.display()))?;
    println!("Wrote {} found row(s) to {}", found.rows, found.path.display());

    if let Some(results_path) = &cli.results {
        let results = handle
            .download_results(results_path)
            .with_context(|| format!("failed to write {}", results_path.display()))?;
        println!("Wrote {} result(s) to {}", results.rows, results.path.display());
    }

    let stats = handle.wait()?;
    println!("{stats}");
    Ok(stats)
}

fn default_found_path() -> PathBuf {
    PathBuf::from(format!("found-{}.csv", Utc::now().format("%Y%m%dT%H%M%SZ")))
}

/// Signals `token` on the first Ctrl-C; a second one exits immediately.
fn watch_ctrl_c(token: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;

    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if token.signal() {
                        checker_warn!("Interrupted; finishing in-flight probes (Ctrl-C again to abort)");
                    } else {
                        std::process::exit(i32::from(EXIT_INTERRUPTED));
                    }
                }
            })
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}
