use std::time::{Duration, Instant};

/// Restartable interval gate on the monotonic clock. Armed on creation.
#[derive(Clone, Debug)]
pub struct Pacer {
    interval: Duration,
    started_at: Instant,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started_at: Instant::now(),
        }
    }

    /// Resets the reference point to now and arms `interval` from it.
    pub fn start(&mut self, interval: Duration) {
        self.interval = interval;
        self.started_at = Instant::now();
    }

    pub fn is_elapsed(&self) -> bool {
        self.started_at.elapsed() >= self.interval
    }

    pub fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.started_at.elapsed())
    }
}
