//! Barrier-based collective reduction across workers
//!
//! Every rank must call [`Collective::reduce`] once per round. The call
//! returns only after all ranks have contributed; rank 0 receives the
//! combined value and every other rank receives `None`.

use parking_lot::Mutex;
use std::sync::Barrier;

/// Rank that receives reduced values
pub const ROOT_RANK: usize = 0;

pub struct Collective<T> {
    ranks: usize,
    barrier: Barrier,
    acc: Mutex<Option<T>>,
}

impl<T: Send> Collective<T> {
    pub fn new(ranks: usize) -> Self {
        Self {
            ranks,
            barrier: Barrier::new(ranks),
            acc: Mutex::new(None),
        }
    }

    pub fn ranks(&self) -> usize {
        self.ranks
    }

    /// Fold `value` into the round's accumulator with `op`.
    ///
    /// `op` must be associative and commutative: contributions arrive in
    /// whatever order the ranks reach the call.
    pub fn reduce<F>(&self, rank: usize, value: T, op: F) -> Option<T>
    where
        F: FnOnce(T, T) -> T,
    {
        {
            let mut acc = self.acc.lock();
            let combined = match acc.take() {
                Some(prev) => op(prev, value),
                None => value,
            };
            *acc = Some(combined);
        }

        self.barrier.wait();

        let out = if rank == ROOT_RANK {
            self.acc.lock().take()
        } else {
            None
        };

        // Keep the next round's contributions out until the root has taken this one
        self.barrier.wait();

        out
    }
}
