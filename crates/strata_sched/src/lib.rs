//! Strata cross-thread scheduling
//!
//! Primitives for handing work to one fixed target thread:
//! - [`TaskRunner`] implementations (a real tokio-backed thread and a
//!   deterministic manual runner with a virtual clock)
//! - [`CancelableSlot`] for "at most one outstanding callback" scheduling
//! - [`ScopedThreadProxy`] with level-triggered shutdown
//! - [`RateLimiter`] and its per-context registry

pub mod cancelable;
pub mod clock;
pub mod error;
pub mod manual;
pub mod rate_limiter;
pub mod task_runner;
pub mod thread_proxy;

pub use cancelable::{cancelable, CancelHandle, CancelableSlot};
pub use clock::{Clock, SystemClock};
pub use error::SchedulerError;
pub use manual::ManualTaskRunner;
pub use rate_limiter::{
    ContextId, RateLimitedContext, RateLimiter, RateLimiterClient, RateLimiterRegistry,
    DEFAULT_RATE_LIMIT_INTERVAL,
};
pub use task_runner::{Task, TaskRunner, ThreadTaskRunner};
pub use thread_proxy::ScopedThreadProxy;
