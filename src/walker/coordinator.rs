//! Run coordinator - orchestrates the parallel traversal
//!
//! The coordinator is responsible for:
//! - Setting up the work queue and the collectives
//! - Spawning one worker thread per rank
//! - Progress sampling and interrupt handling (graceful shutdown)
//! - Handing back the result reduced on rank 0
//!
//! Each worker runs the same sequence:
//!
//! ```text
//! start clock ─► begin (rank 0 seeds) ─► drain ─► [delete: gather dirs, rank 0 rmdirs]
//!             ─► stop clock ─► aggregate (max runtime, sum counters)
//! ```

use crate::config::{Mode, RunConfig};
use crate::error::{ConfigError, FindError, Result, WorkerError};
use crate::walker::aggregate::{aggregate, GlobalResult, LocalResult, Partial};
use crate::walker::collective::Collective;
use crate::walker::driver::{remove_deferred_dirs, TraversalDriver};
use crate::walker::queue::{LocalQueue, QueueStats, WorkQueue};
use crate::walker::stonewall::Stonewall;
use chrono::Utc;
use crossbeam_channel::bounded;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

type WorkerHandle = JoinHandle<Result<Option<GlobalResult>>>;

/// Shared state every worker thread receives
struct WorkerContext {
    config: Arc<RunConfig>,
    queue: Arc<WorkQueue>,
    results: Arc<Collective<Partial>>,
    dirs: Arc<Collective<Vec<PathBuf>>>,
}

/// Coordinates the parallel traversal
pub struct FindCoordinator {
    /// Configuration
    config: Arc<RunConfig>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,

    /// Queue statistics, readable while the run is in progress
    stats: Arc<QueueStats>,
}

impl FindCoordinator {
    /// Create a new coordinator
    pub fn new(config: RunConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Snapshot of queue activity
    pub fn progress(&self, elapsed: Duration) -> WalkProgress {
        WalkProgress {
            processed: self.stats.processed(),
            enqueued: self.stats.enqueued(),
            pending: self.stats.pending(),
            stolen: self.stats.stolen(),
            total_workers: self.config.worker_count,
            elapsed,
        }
    }

    /// Run the traversal to completion
    pub fn run(&self) -> Result<GlobalResult> {
        let workers = self.config.worker_count;

        // The root may have changed since the configuration was validated
        fs::read_dir(&self.config.root).map_err(|e| ConfigError::UnreadableRoot {
            path: self.config.root.clone(),
            reason: e.to_string(),
        })?;

        info!(
            root = %self.config.root.display(),
            mode = self.config.mode.as_str(),
            workers = workers,
            start_time = %Utc::now().to_rfc3339(),
            "Starting traversal"
        );

        let (queue, locals) = WorkQueue::new(
            workers,
            Arc::clone(&self.shutdown),
            Arc::clone(&self.stats),
        );

        let ctx = Arc::new(WorkerContext {
            config: Arc::clone(&self.config),
            queue: Arc::new(queue),
            results: Arc::new(Collective::new(workers)),
            dirs: Arc::new(Collective::new(workers)),
        });

        let handles = spawn_workers(&ctx, locals, |id| {
            thread::Builder::new().name(format!("pfind-{}", id))
        })?;
        let mut result = self.join_workers(handles)?;

        result.completed = !self.shutdown.load(Ordering::SeqCst);

        info!(
            found = result.found_files,
            errors = result.errors,
            runtime_secs = result.runtime,
            stonewalled = result.stonewalled,
            completed = result.completed,
            "Traversal finished"
        );

        Ok(result)
    }

    /// Run while sampling progress every 100ms
    pub fn run_with_progress<F>(&self, progress_callback: F) -> Result<GlobalResult>
    where
        F: Fn(WalkProgress) + Send + 'static,
    {
        let start = Instant::now();
        let finished = Arc::new(AtomicBool::new(false));
        let stats = Arc::clone(&self.stats);
        let total_workers = self.config.worker_count;

        let progress_handle = {
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                while !finished.load(Ordering::Relaxed) {
                    progress_callback(WalkProgress {
                        processed: stats.processed(),
                        enqueued: stats.enqueued(),
                        pending: stats.pending(),
                        stolen: stats.stolen(),
                        total_workers,
                        elapsed: start.elapsed(),
                    });
                    thread::sleep(Duration::from_millis(100));
                }
            })
        };

        let result = self.run();

        finished.store(true, Ordering::SeqCst);
        let _ = progress_handle.join();

        result
    }

    /// Join all worker threads and take rank 0's result
    fn join_workers(&self, handles: Vec<WorkerHandle>) -> Result<GlobalResult> {
        let mut global = None;
        let mut first_error: Option<FindError> = None;

        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(Some(result))) => global = Some(result),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(worker = id, error = %e, "Worker failed");
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(FindError::Worker(WorkerError::Panicked {
                        id,
                        message: "Worker thread panicked".into(),
                    }));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        global.ok_or(FindError::Worker(WorkerError::MissingResult))
    }
}

/// Spawn one parked thread per rank, then launch them all.
///
/// A thread waits for its local queue before it runs its rank, so a failed
/// spawn never leaves earlier threads stuck in the start barrier or the
/// collectives: their launch channels are dropped and they exit unlaunched.
fn spawn_workers<B>(
    ctx: &Arc<WorkerContext>,
    locals: Vec<LocalQueue>,
    builder: B,
) -> Result<Vec<WorkerHandle>>
where
    B: Fn(usize) -> thread::Builder,
{
    let mut handles = Vec::with_capacity(locals.len());
    let mut launchers = Vec::with_capacity(locals.len());

    for id in 0..locals.len() {
        let (launcher, launch) = bounded::<LocalQueue>(1);
        let ctx = Arc::clone(ctx);

        let spawned = builder(id).spawn(move || match launch.recv() {
            Ok(local) => worker_main(local, &ctx),
            Err(_) => Ok(None),
        });

        match spawned {
            Ok(handle) => {
                handles.push(handle);
                launchers.push(launcher);
            }
            Err(e) => {
                drop(launchers);
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(WorkerError::InitFailed {
                    id,
                    reason: e.to_string(),
                }
                .into());
            }
        }
    }

    for (launcher, local) in launchers.iter().zip(locals) {
        // The receiver is parked in recv until this send
        let _ = launcher.send(local);
    }

    debug!(count = handles.len(), "Workers spawned");
    Ok(handles)
}

/// Body of one worker thread.
///
/// Every rank reaches the collectives even after an error, otherwise the
/// other ranks would block in them forever.
fn worker_main(local_queue: LocalQueue, ctx: &WorkerContext) -> Result<Option<GlobalResult>> {
    let rank = local_queue.rank();
    let start = Instant::now();
    let stonewall = Stonewall::new(ctx.config.stonewall, start);
    let driver = TraversalDriver::new(Arc::clone(&ctx.config), stonewall);
    let mut local = LocalResult::default();

    let outcome = ctx.queue.begin(
        local_queue,
        |queue| driver.seed(queue),
        |token, queue| driver.process(&token, queue, &mut local),
    );

    if ctx.config.mode == Mode::Delete {
        let deferred = std::mem::take(&mut local.deferred_dirs);
        let gathered = ctx.dirs.reduce(rank, deferred, |mut a, mut b| {
            a.append(&mut b);
            a
        });
        if let Some(dirs) = gathered {
            let total = dirs.len();
            let removed = remove_deferred_dirs(dirs);
            debug!(removed = removed, total = total, "Removed deferred directories");
        }
    }

    let runtime = start.elapsed();
    debug!(
        worker = rank,
        found = local.found_files,
        errors = local.errors,
        runtime_secs = runtime.as_secs_f64(),
        "Worker finished"
    );

    let global = aggregate(rank, &local, runtime, &ctx.results);
    outcome.map(|()| global)
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct WalkProgress {
    /// Items fully processed
    pub processed: u64,

    /// Items enqueued so far
    pub enqueued: u64,

    /// Items queued or in flight
    pub pending: u64,

    /// Items moved between workers
    pub stolen: u64,

    /// Total workers
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl WalkProgress {
    /// Calculate items per second rate
    pub fn items_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}
