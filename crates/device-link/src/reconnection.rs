//! Fixed-interval retry bookkeeping for the pub/sub transport.
//!
//! Instead of looping until the broker answers, the tick records the
//! earliest instant at which the next attempt may start and checks it on
//! every pass.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct RetrySchedule {
    interval: Duration,
    next_attempt: Option<Instant>,
}

impl RetrySchedule {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_attempt: None,
        }
    }

    /// Whether an attempt may start at `now`. Always true before the first
    /// attempt.
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.next_attempt.is_none_or(|at| now >= at)
    }

    /// Records an attempt made at `now`.
    pub(crate) fn attempted(&mut self, now: Instant) {
        self.next_attempt = Some(now + self.interval);
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn clear(&mut self) {
        self.next_attempt = None;
    }
}
