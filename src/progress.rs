//! Progress reporting for uploads
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::walker::{RunSummary, SweepProgress};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Progress reporter that displays upload status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &SweepProgress) {
        let msg = format!(
            "Found: {} | Uploaded: {} | Failed: {} | Size: {} | Rate: {:.0}/s | Queue: {} | Workers: {}/{}",
            format_number(progress.discovered),
            format_number(progress.succeeded),
            format_number(progress.failed),
            format_size(progress.bytes, BINARY),
            progress.files_per_second(),
            format_number(progress.queued),
            progress.active_workers,
            progress.total_workers,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the run
pub fn print_summary(summary: &RunSummary, failure_log: &Path) {
    let duration_secs = summary.elapsed.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.files_succeeded as f64 / duration_secs
    } else {
        0.0
    };

    let title = if summary.is_success() {
        style("Upload Complete").green().bold()
    } else if !summary.completed {
        style("Upload Interrupted").red().bold()
    } else {
        style("Upload Complete With Failures").yellow().bold()
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Discovered:").bold(),
        format_number(summary.files_discovered)
    );
    println!(
        "  {} {}",
        style("Uploaded:").bold(),
        format_number(summary.files_succeeded)
    );
    if summary.files_failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").yellow().bold(),
            format_number(summary.files_failed)
        );
    } else {
        println!("  {} 0", style("Failed:").bold());
    }
    if summary.files_skipped > 0 {
        println!(
            "  {} {}",
            style("Skipped:").red().bold(),
            format_number(summary.files_skipped)
        );
    }
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(summary.bytes_uploaded, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if summary.failure_log_entries > 0 {
        println!(
            "  {} {} ({} entries)",
            style("Failure log:").bold(),
            failure_log.display(),
            summary.failure_log_entries
        );
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(root: &str, destination: &str, workers: usize, max_attempts: u32) {
    println!();
    println!(
        "{} {}",
        style("blob-sweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), root);
    println!("  {} {}", style("Destination:").bold(), destination);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Max attempts:").bold(), max_attempts);
    println!();
}
