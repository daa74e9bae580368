//! blob-sweep - Bulk upload of a local directory tree
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use blob_sweep::config::{CliArgs, SweepConfig};
use blob_sweep::progress::{print_header, print_summary, ProgressReporter};
use blob_sweep::upload::{DryRun, LocalStore, Uploader};
use blob_sweep::walker::{RunSummary, SweepCoordinator};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for a run stopped by Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    match run() {
        Ok(summary) if !summary.completed => ExitCode::from(EXIT_INTERRUPTED),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunSummary> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = SweepConfig::from_args(args).context("Invalid configuration")?;

    // Build the uploader before any work starts
    let uploader = build_uploader(&config).context("Failed to initialize uploader")?;

    if config.show_progress {
        print_header(
            &config.root.display().to_string(),
            &destination(&config, uploader.as_ref()),
            config.worker_count,
            config.max_attempts,
        );
    }

    let coordinator = SweepCoordinator::new(config.clone(), uploader)
        .context("Failed to initialize coordinator")?;

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        if shutdown_flag.load(Ordering::Relaxed) {
            eprintln!("\nForce shutdown!");
            std::process::exit(EXIT_INTERRUPTED as i32);
        }
        eprintln!("\nInterrupt received, finishing in-flight uploads... (press Ctrl+C again to force)");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    // Poll counters on a separate thread while the walk runs here
    let done = Arc::new(AtomicBool::new(false));
    let progress_thread = if config.show_progress {
        let monitor = coordinator.monitor();
        let done = Arc::clone(&done);
        let start = Instant::now();

        Some(thread::spawn(move || {
            let reporter = ProgressReporter::new();
            reporter.set_status("Walking directory tree...");
            while !done.load(Ordering::Relaxed) {
                reporter.update(&monitor.snapshot(start.elapsed()));
                thread::sleep(Duration::from_millis(100));
            }
            reporter.finish_and_clear();
        }))
    } else {
        None
    };

    let result = coordinator.run();

    done.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_thread {
        let _ = handle.join();
    }

    let summary = result.context("Upload failed")?;

    // Print summary
    if config.show_progress {
        print_summary(&summary, &config.failure_log);
    }

    if !summary.completed {
        warn!("Upload was interrupted before completion");
    }

    if summary.files_failed > 0 {
        warn!(
            failed = summary.files_failed,
            log = %config.failure_log.display(),
            "Some files could not be uploaded"
        );
    } else {
        info!(uploaded = summary.files_succeeded, "All files uploaded");
    }

    Ok(summary)
}

fn build_uploader(config: &SweepConfig) -> Result<Arc<dyn Uploader>> {
    LocalStore::validate_container(&config.container)?;

    if config.dry_run {
        return Ok(Arc::new(DryRun));
    }

    let store = LocalStore::open(&config.store_path)?;
    Ok(Arc::new(store))
}

fn destination(config: &SweepConfig, uploader: &dyn Uploader) -> String {
    if config.dry_run {
        format!("{} ({})", config.container, uploader.name())
    } else {
        format!(
            "{}/{} ({})",
            config.store_path.display(),
            config.container,
            uploader.name()
        )
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("blob_sweep=debug,warn")
    } else {
        EnvFilter::new("blob_sweep=info,warn")
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
