//! Per-worker wall-clock cutoff
//!
//! Each worker derives its own deadline from its own start time. There is no
//! clock synchronisation between workers, so two workers may stop expanding
//! at slightly different instants.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Stonewall {
    deadline: Option<Instant>,
}

impl Stonewall {
    /// Deadline at `start + budget`; a zero budget disables the cutoff
    pub fn new(budget: Duration, start: Instant) -> Self {
        let deadline = if budget.is_zero() {
            None
        } else {
            start.checked_add(budget)
        };
        Self { deadline }
    }

    pub fn disabled() -> Self {
        Self { deadline: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.deadline.is_some()
    }

    /// One clock read; always false when disabled
    #[inline]
    pub fn expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}
