//! Per-worker counters and their reduction into the global result

use crate::walker::collective::Collective;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Counters owned by one worker for the length of a run
#[derive(Debug, Clone, Default)]
pub struct LocalResult {
    /// Files that passed the filter
    pub found_files: u64,

    /// Failed metadata lookups
    pub errors: u64,

    /// This worker cut at least one directory scan short
    pub stonewalled: bool,

    /// Directories to remove once the queue has drained (delete mode)
    pub deferred_dirs: Vec<PathBuf>,
}

/// What each rank contributes to the reduction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Partial {
    pub runtime_secs: f64,
    pub found_files: u64,
    pub errors: u64,
    pub stonewalled: bool,
}

impl Partial {
    pub fn new(local: &LocalResult, runtime: Duration) -> Self {
        Self {
            runtime_secs: runtime.as_secs_f64(),
            found_files: local.found_files,
            errors: local.errors,
            stonewalled: local.stonewalled,
        }
    }

    /// Max for runtime, sum for counters
    pub fn combine(self, other: Self) -> Self {
        Self {
            runtime_secs: self.runtime_secs.max(other.runtime_secs),
            found_files: self.found_files + other.found_files,
            errors: self.errors + other.errors,
            stonewalled: self.stonewalled || other.stonewalled,
        }
    }
}

/// Final result of a run, produced on rank 0
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalResult {
    /// Slowest worker's elapsed time in seconds
    pub runtime: f64,

    /// Matched files across all workers
    pub found_files: u64,

    /// Failed metadata lookups across all workers
    pub errors: u64,

    /// found_files / runtime
    pub rate: f64,

    /// Number of workers that took part
    pub workers: usize,

    /// At least one worker hit the stonewall
    pub stonewalled: bool,

    /// False if the run was interrupted
    pub completed: bool,
}

impl GlobalResult {
    pub fn from_partial(partial: Partial, workers: usize) -> Self {
        let rate = if partial.runtime_secs > 0.0 {
            partial.found_files as f64 / partial.runtime_secs
        } else {
            0.0
        };

        Self {
            runtime: partial.runtime_secs,
            found_files: partial.found_files,
            errors: partial.errors,
            rate,
            workers,
            stonewalled: partial.stonewalled,
            completed: true,
        }
    }
}

/// Collective step: every rank calls this once after the drain.
///
/// Returns `Some` on rank 0 only.
pub fn aggregate(
    rank: usize,
    local: &LocalResult,
    runtime: Duration,
    collective: &Collective<Partial>,
) -> Option<GlobalResult> {
    collective
        .reduce(rank, Partial::new(local, runtime), Partial::combine)
        .map(|partial| GlobalResult::from_partial(partial, collective.ranks()))
}
