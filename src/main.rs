//! pfind - Parallel Recursive Find and Delete
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use pfind::config::{CliArgs, Mode, RunConfig};
use pfind::progress::{print_header, print_summary, ProgressReporter};
use pfind::walker::FindCoordinator;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = RunConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(&config, &chrono::Local::now().to_rfc2822());
    }

    let mode = config.mode;
    let show_progress = config.show_progress;
    let json = config.json;

    let coordinator = FindCoordinator::new(config);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let outcome = if show_progress {
        let progress = Arc::new(ProgressReporter::new());
        progress.set_status("Starting workers...");

        let reporter = Arc::clone(&progress);
        let result = coordinator.run_with_progress(move |p| reporter.update(&p));

        match &result {
            Ok(r) if r.completed => progress.finish(&format!("{} completed", mode.as_str())),
            Ok(_) => progress.finish(&format!("{} interrupted", mode.as_str())),
            Err(_) => progress.finish_and_clear(),
        }
        result
    } else {
        coordinator.run()
    };

    let result = outcome.context("Traversal failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
    } else {
        print_summary(&result, mode);
    }

    if !result.completed {
        info!("Run was interrupted before completion");
    }

    if mode == Mode::Find && result.errors > 0 {
        info!(errors = result.errors, "Run completed with stat errors");
    }

    Ok(())
}

fn setup_logging(verbosity: u8) -> Result<()> {
    let filter = if verbosity >= 2 {
        EnvFilter::new("pfind=debug,warn")
    } else {
        EnvFilter::new("pfind=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
