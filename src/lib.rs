//! pfind - Parallel Recursive Find and Delete
//!
//! Traverses a directory tree with a pool of cooperating workers and either
//! counts the regular files that match a size/name/freshness policy or
//! removes every entry below the root.
//!
//! # Features
//!
//! - **Work Stealing**: Each directory becomes a work item; idle workers
//!   steal queued items from busy ones, so wide and deep trees balance
//!   themselves without a central scheduler.
//!
//! - **Stonewall Cutoff**: An optional wall-clock budget after which
//!   workers stop expanding directories but still drain what is queued,
//!   giving a consistent, time-bounded partial result.
//!
//! - **Collective Result**: Per-worker counters are reduced once at the
//!   end (max runtime, summed counts) into a single global result.
//!
//! # Example
//!
//! ```bash
//! # Count files of 3900 bytes newer than WORKDIR/IO500_TIMESTAMP
//! pfind /scratch/run-1
//!
//! # 32 workers, stop after 5 minutes, only names containing "01"
//! pfind /scratch/run-1 -w 32 --stonewall 300 --name 01
//!
//! # Remove everything below the root
//! pfind /scratch/run-1 --delete
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod walker;

pub use config::{CliArgs, Mode, RunConfig};
pub use error::{FindError, Result};
pub use walker::{FilterPolicy, FindCoordinator, GlobalResult};
