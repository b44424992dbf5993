//! Strata Metrics - pass timing and event counters
//!
//! Instrumentation for the memory manager and schedulers that vanishes in
//! production builds via a feature flag.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use strata_metrics::{Counter, PassTimer};
//!
//! let mut timer = PassTimer::new(32); // Track the last 32 passes
//! let assigned = timer.time(|| manager_pass());
//! println!("avg pass: {:.3} ms", timer.average_ms());
//! ```
//!
//! Without `metrics`, every type below is an empty stub and each call
//! compiles down to nothing (or straight to the timed closure).

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod pass_timer;
#[cfg(feature = "metrics")]
mod ring_buffer;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use pass_timer::PassTimer;
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &'static str, _value: u64) {}
    pub fn get(&self, _name: &'static str) -> u64 { 0 }
    pub fn reset_all(&mut self) {}
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug)]
pub struct RingBuffer<T>(std::marker::PhantomData<T>);

#[cfg(not(feature = "metrics"))]
impl<T> RingBuffer<T> {
    pub fn new(_capacity: usize) -> Self { Self(std::marker::PhantomData) }
    pub fn push(&mut self, _value: T) {}
    pub fn len(&self) -> usize { 0 }
    pub fn is_empty(&self) -> bool { true }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct PassTimer;

#[cfg(not(feature = "metrics"))]
impl PassTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn time<F, R>(&mut self, f: F) -> R where F: FnOnce() -> R { f() }
    pub fn record(&mut self, _elapsed: std::time::Duration) {}
    pub fn passes(&self) -> u64 { 0 }
    pub fn average_ms(&self) -> f64 { 0.0 }
    pub fn max_ms(&self) -> f64 { 0.0 }
}
