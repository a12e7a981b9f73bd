use std::collections::VecDeque;

use crate::error::TransportError;

/// Fixed-capacity FIFO of payloads waiting for the stream to authenticate.
///
/// Backed by a `VecDeque`. When the queue is full, the oldest payload is
/// evicted on each push, so it always holds the most recent unsent
/// payloads. Iteration order is oldest → newest.
#[derive(Debug, Clone)]
pub struct OutboundQueue<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> OutboundQueue<T> {
    /// Create an empty queue. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a payload, returning the evicted oldest one when at capacity.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.buf.len() == self.capacity {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(value);
        evicted
    }

    /// Forward payloads oldest-first through `send`, one at a time.
    ///
    /// A payload leaves the queue only after `send` accepts it. The first
    /// failure stops the drain and leaves it (and everything behind it)
    /// queued. Returns the number of payloads forwarded.
    pub fn drain<F>(&mut self, mut send: F) -> Result<usize, (usize, TransportError)>
    where
        F: FnMut(&T) -> Result<(), TransportError>,
    {
        let mut sent = 0;
        while let Some(front) = self.buf.front() {
            if let Err(e) = send(front) {
                return Err((sent, e));
            }
            self.buf.pop_front();
            sent += 1;
        }
        Ok(sent)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    /// Number of payloads currently queued.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the queue holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of payloads the queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the queue is at full capacity.
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Remove all payloads.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
