//! Timing for discrete scheduling passes

use super::ring_buffer::RingBuffer;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PassTimer {
    durations: RingBuffer<Duration>,
    passes: u64,
}

impl PassTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            durations: RingBuffer::new(capacity),
            passes: 0,
        }
    }

    /// Run `f`, recording how long it took.
    pub fn time<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(start.elapsed());
        result
    }

    /// Record a pass timed by the caller.
    pub fn record(&mut self, elapsed: Duration) {
        self.durations.push(elapsed);
        self.passes += 1;
    }

    /// Total passes timed, including ones that fell out of the window.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn average_ms(&self) -> f64 {
        self.durations.average().as_secs_f64() * 1000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.durations.max().as_secs_f64() * 1000.0
    }
}

impl Default for PassTimer {
    fn default() -> Self {
        Self::new(32)
    }
}
