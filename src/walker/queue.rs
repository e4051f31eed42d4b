//! Work-stealing work queue
//!
//! Every worker owns a FIFO deque. New work goes to the local deque; an idle
//! worker first takes a batch from the shared injector, then steals from its
//! peers. A global pending counter tracks items that are queued or being
//! processed, so the queue is drained exactly when it drops to zero.
//!
//! ```text
//!            Injector (seed)
//!                 │
//!   ┌─────────────┼─────────────┐
//!   ▼             ▼             ▼
//! Worker 0 ◄──► Worker 1 ◄──► Worker N     (steal on empty)
//!  pop → process → push children
//! ```
//!
//! The driver only sees the [`Enqueue`] capability, never this type.

use crate::error::Result;
use crate::walker::item::Token;
use crossbeam_deque::{Injector, Steal, Stealer, Worker as DequeWorker};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Spins without work before a worker starts sleeping between polls
const MAX_IDLE_SPINS: u32 = 1000;

/// Sleep between polls once idle
const IDLE_SLEEP: Duration = Duration::from_micros(100);

/// Capability to add new work from inside a process step
pub trait Enqueue {
    fn enqueue(&mut self, token: Token);
}

impl Enqueue for Vec<Token> {
    fn enqueue(&mut self, token: Token) {
        self.push(token);
    }
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued (seed included)
    pub enqueued: AtomicU64,

    /// Total items fully processed
    pub processed: AtomicU64,

    /// Items obtained from another worker or the injector
    pub stolen: AtomicU64,

    /// Items queued or in flight
    pub pending: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn stolen(&self) -> u64 {
        self.stolen.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }
}

/// A worker's private end of the queue
pub struct LocalQueue {
    rank: usize,
    deque: DequeWorker<Token>,
}

impl LocalQueue {
    pub fn rank(&self) -> usize {
        self.rank
    }
}

/// Shared end of the queue
pub struct WorkQueue {
    injector: Injector<Token>,
    stealers: Vec<Stealer<Token>>,
    start: Barrier,
    shutdown: Arc<AtomicBool>,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    /// Create a queue for `workers` ranks and hand out their local ends
    pub fn new(
        workers: usize,
        shutdown: Arc<AtomicBool>,
        stats: Arc<QueueStats>,
    ) -> (Self, Vec<LocalQueue>) {
        let mut locals = Vec::with_capacity(workers);
        let mut stealers = Vec::with_capacity(workers);

        for rank in 0..workers {
            let deque = DequeWorker::new_fifo();
            stealers.push(deque.stealer());
            locals.push(LocalQueue { rank, deque });
        }

        let queue = Self {
            injector: Injector::new(),
            stealers,
            start: Barrier::new(workers),
            shutdown,
            stats,
        };

        (queue, locals)
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Push work that no worker owns yet
    pub fn seed(&self, token: Token) {
        self.stats.pending.fetch_add(1, Ordering::SeqCst);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.injector.push(token);
    }

    /// Check if all work is complete
    pub fn is_drained(&self) -> bool {
        self.stats.pending() == 0
    }

    /// Run one worker until the queue is drained or shutdown is signalled.
    ///
    /// Rank 0 runs `create` first; all ranks then meet at a start barrier so
    /// no worker can observe an empty, unseeded queue and leave early.
    /// An error from either callback stops every worker.
    pub fn begin<C, P>(&self, local: LocalQueue, create: C, process: P) -> Result<()>
    where
        C: FnOnce(&mut dyn Enqueue) -> Result<()>,
        P: FnMut(Token, &mut dyn Enqueue) -> Result<()>,
    {
        let seeded = if local.rank == 0 {
            let mut handle = Seeder { queue: self };
            let seeded = create(&mut handle);
            if seeded.is_err() {
                self.shutdown.store(true, Ordering::SeqCst);
            }
            seeded
        } else {
            Ok(())
        };

        self.start.wait();
        seeded?;

        self.drain(&local, process)
    }

    fn drain<P>(&self, local: &LocalQueue, mut process: P) -> Result<()>
    where
        P: FnMut(Token, &mut dyn Enqueue) -> Result<()>,
    {
        debug!(worker = local.rank, "Worker draining");
        let mut idle_spins = 0;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!(worker = local.rank, "Shutdown observed");
                return Ok(());
            }

            let token = match self.dequeue(local) {
                Some(token) => {
                    idle_spins = 0;
                    token
                }
                None => {
                    if self.is_drained() {
                        break;
                    }

                    idle_spins += 1;
                    if idle_spins > MAX_IDLE_SPINS {
                        thread::sleep(IDLE_SLEEP);
                        idle_spins = 0;
                    } else {
                        std::hint::spin_loop();
                    }
                    continue;
                }
            };

            let mut handle = LocalHandle { local, queue: self };
            let result = process(token, &mut handle);

            // Children were counted before this decrement, so pending
            // cannot touch zero while work remains
            self.stats.pending.fetch_sub(1, Ordering::SeqCst);
            self.stats.processed.fetch_add(1, Ordering::Relaxed);

            if let Err(e) = result {
                self.shutdown.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }

        debug!(worker = local.rank, "Queue drained");
        Ok(())
    }

    /// Local deque first, then the injector, then peers
    fn dequeue(&self, local: &LocalQueue) -> Option<Token> {
        if let Some(token) = local.deque.pop() {
            return Some(token);
        }

        loop {
            match self.injector.steal_batch_and_pop(&local.deque) {
                Steal::Success(token) => {
                    self.stats.stolen.fetch_add(1, Ordering::Relaxed);
                    return Some(token);
                }
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        for (i, stealer) in self.stealers.iter().enumerate() {
            if i == local.rank {
                continue;
            }
            loop {
                match stealer.steal_batch_and_pop(&local.deque) {
                    Steal::Success(token) => {
                        self.stats.stolen.fetch_add(1, Ordering::Relaxed);
                        return Some(token);
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }
}

/// Enqueue handle given to the create callback
struct Seeder<'q> {
    queue: &'q WorkQueue,
}

impl Enqueue for Seeder<'_> {
    fn enqueue(&mut self, token: Token) {
        self.queue.seed(token);
    }
}

/// Enqueue handle given to the process callback
struct LocalHandle<'q> {
    local: &'q LocalQueue,
    queue: &'q WorkQueue,
}

impl Enqueue for LocalHandle<'_> {
    fn enqueue(&mut self, token: Token) {
        self.queue.stats.pending.fetch_add(1, Ordering::SeqCst);
        self.queue.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.local.deque.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, FindError};
    use parking_lot::Mutex;

    fn token(s: &str) -> Token {
        Token::from_bytes(s.as_bytes().to_vec())
    }

    fn new_queue(workers: usize) -> (Arc<WorkQueue>, Vec<LocalQueue>) {
        let (queue, locals) = WorkQueue::new(
            workers,
            Arc::new(AtomicBool::new(false)),
            Arc::new(QueueStats::default()),
        );
        (Arc::new(queue), locals)
    }

    #[test]
    fn test_single_worker_drains() {
        let (queue, mut locals) = new_queue(1);
        let mut seen = Vec::new();

        queue
            .begin(
                locals.remove(0),
                |q| {
                    q.enqueue(token("d/root"));
                    Ok(())
                },
                |t, q| {
                    if t.as_bytes() == b"d/root" {
                        q.enqueue(token("f/root/a"));
                        q.enqueue(token("f/root/b"));
                    }
                    seen.push(t);
                    Ok(())
                },
            )
            .unwrap();

        assert_eq!(seen.len(), 3);
        assert!(queue.is_drained());
        assert_eq!(queue.stats().enqueued(), 3);
        assert_eq!(queue.stats().processed(), 3);
    }

    #[test]
    fn test_fan_out_across_workers() {
        // Each item "dN" spawns N children "d(N-1)", so the total is 2^depth - 1
        let workers = 4;
        let depth = 10u32;
        let (queue, locals) = new_queue(workers);
        let processed = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = locals
            .into_iter()
            .map(|local| {
                let queue = Arc::clone(&queue);
                let processed = Arc::clone(&processed);
                thread::spawn(move || {
                    let mut count = 0u64;
                    queue
                        .begin(
                            local,
                            |q| {
                                q.enqueue(token(&format!("d{}", depth)));
                                Ok(())
                            },
                            |t, q| {
                                let level: u32 = std::str::from_utf8(&t.as_bytes()[1..])
                                    .unwrap()
                                    .parse()
                                    .unwrap();
                                if level > 1 {
                                    q.enqueue(token(&format!("d{}", level - 1)));
                                    q.enqueue(token(&format!("d{}", level - 1)));
                                }
                                count += 1;
                                Ok(())
                            },
                        )
                        .unwrap();
                    processed.lock().push(count);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let total: u64 = processed.lock().iter().sum();
        assert_eq!(total, (1u64 << depth) - 1);
        assert!(queue.is_drained());
    }

    #[test]
    fn test_error_stops_workers() {
        let (queue, mut locals) = new_queue(1);

        let result = queue.begin(
            locals.remove(0),
            |q| {
                q.enqueue(token("d/root"));
                Ok(())
            },
            |_, _| Err(FindError::Codec(CodecError::Malformed("bad".into()))),
        );

        assert!(matches!(result, Err(FindError::Codec(_))));
        assert!(queue.shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn test_vec_enqueue() {
        let mut items: Vec<Token> = Vec::new();
        items.enqueue(token("f/x"));
        assert_eq!(items.len(), 1);
    }
}
