//! Throttling of progress writes.
//!
//! The downloader can print dozens of progress lines per second; only one
//! write per interval reaches the queue, except that a 100% snapshot is
//! always forwarded at once.

use std::time::{Duration, Instant};

use crate::queue::Progress;

#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Whether `progress` observed at `now` should be written. Records the
    /// send time when it returns true.
    pub fn should_forward(&mut self, progress: &Progress, now: Instant) -> bool {
        let due = match self.last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due || progress.is_complete() {
            self.last_sent = Some(now);
            return true;
        }
        false
    }
}
