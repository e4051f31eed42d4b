//! Progress reporting for the traversal
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::config::{Mode, RunConfig};
use crate::walker::{GlobalResult, WalkProgress};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Progress reporter that displays traversal status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,

    /// Stop signal
    stop: Arc<AtomicBool>,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Update the progress display
    pub fn update(&self, progress: &WalkProgress) {
        if self.stop.load(Ordering::Relaxed) {
            return;
        }

        let msg = format!(
            "Processed: {} | Pending: {} | Stolen: {} | Rate: {:.0}/s | Workers: {}",
            format_number(progress.processed),
            format_number(progress.pending),
            format_number(progress.stolen),
            progress.items_per_second(),
            progress.total_workers,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.stop.store(true, Ordering::SeqCst);
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.stop.store(true, Ordering::SeqCst);
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
pub fn print_summary(result: &GlobalResult, mode: Mode) {
    let title = match (mode, result.completed) {
        (_, false) => style("Run Interrupted").yellow().bold(),
        (Mode::Find, true) => style("Find Complete").green().bold(),
        (Mode::Delete, true) => style("Delete Complete").green().bold(),
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    if mode == Mode::Find {
        println!(
            "  {} {}",
            style("Found files:").bold(),
            format_number(result.found_files)
        );
    }
    println!(
        "  {} {:.3}s ({:.1} files/sec)",
        style("Runtime:").bold(),
        result.runtime,
        result.rate
    );
    println!("  {} {}", style("Workers:").bold(), result.workers);
    if result.errors > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(result.errors)
        );
    }
    if result.stonewalled {
        println!(
            "  {} traversal was cut short by the stonewall",
            style("Note:").yellow().bold()
        );
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(config: &RunConfig, start_time: &str) {
    println!();
    println!(
        "{} {}",
        style("pfind").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Mode:").bold(), config.mode.as_str());
    println!("  {} {}", style("Root:").bold(), config.root.display());
    println!("  {} {}", style("Workers:").bold(), config.worker_count);
    if config.mode == Mode::Find {
        println!(
            "  {} {} ({} bytes)",
            style("Size:").bold(),
            format_size(config.policy.expected_size, BINARY),
            config.policy.expected_size
        );
        if let Some(name) = &config.policy.name_substring {
            println!("  {} *{}*", style("Name:").bold(), name);
        }
    }
    if !config.stonewall.is_zero() {
        println!(
            "  {} {}s",
            style("Stonewall:").bold(),
            config.stonewall.as_secs()
        );
    }
    println!("  {} {}", style("Started:").bold(), start_time);
    println!();
}
