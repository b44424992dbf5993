//! Scoped thread proxy
//!
//! Lets any thread post work to one target thread, while the target thread
//! keeps the right to say "nothing more should run" without tracking the
//! individual tasks it was sent.
//!
//! Every posted wrapper holds its own `Arc` to the proxy, so the proxy lives
//! as long as the longest-pending task. The `shutdown` flag, not destruction,
//! is what turns a late task into a no-op: it is checked right before the
//! task body would run.
//!
//! ```ignore
//! let proxy = ScopedThreadProxy::create(runner)?;   // on the target thread
//! proxy.post_task(move || compositor.did_swap()); // from any thread
//! // ... owner teardown, on the target thread:
//! proxy.shutdown();
//! drop(compositor);                                // in-flight tasks no-op
//! ```

use crate::{SchedulerError, TaskRunner};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use strata_metrics::Counter;

pub struct ScopedThreadProxy {
    runner: Arc<dyn TaskRunner>,
    shutdown: AtomicBool,
    counter: Mutex<Counter>,
}

impl ScopedThreadProxy {
    /// Create a proxy targeting `runner`. Must be called on the runner's thread.
    pub fn create(runner: Arc<dyn TaskRunner>) -> Result<Arc<Self>, SchedulerError> {
        if !runner.runs_tasks_on_current_thread() {
            return Err(SchedulerError::WrongThread {
                runner: runner.name().to_string(),
            });
        }
        Ok(Arc::new(Self {
            runner,
            shutdown: AtomicBool::new(false),
            counter: Mutex::new(Counter::new()),
        }))
    }

    /// Post `task` to the target thread. Callable from any thread.
    ///
    /// Returns `false` only if the underlying runner refused the task. A task
    /// that is accepted but reaches the target after [`shutdown`](Self::shutdown)
    /// is dropped silently.
    pub fn post_task<F>(self: &Arc<Self>, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_delayed_task(task, Duration::ZERO)
    }

    pub fn post_delayed_task<F>(self: &Arc<Self>, task: F, delay: Duration) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let proxy = Arc::clone(self);
        self.runner
            .post_delayed_task(Box::new(move || proxy.run_if_not_shutdown(task)), delay)
    }

    /// Stop running posted tasks. Must be called once, on the target thread.
    pub fn shutdown(&self) {
        debug_assert!(
            self.runner.runs_tasks_on_current_thread(),
            "ScopedThreadProxy::shutdown called off the target thread"
        );
        let was_shutdown = self.shutdown.swap(true, Ordering::AcqRel);
        debug_assert!(!was_shutdown, "ScopedThreadProxy::shutdown called twice");
        tracing::debug!(runner = %self.runner.name(), "thread proxy shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Tasks that arrived after shutdown and were discarded. Always 0
    /// without the `metrics` feature.
    pub fn dropped_task_count(&self) -> u64 {
        self.counter().get("dropped_tasks")
    }

    pub fn runner(&self) -> &Arc<dyn TaskRunner> {
        &self.runner
    }

    fn run_if_not_shutdown<F: FnOnce()>(&self, task: F) {
        if self.is_shutdown() {
            self.counter().increment("dropped_tasks", 1);
            tracing::trace!(runner = %self.runner.name(), "dropping task posted before shutdown");
            return;
        }
        task();
    }

    fn counter(&self) -> MutexGuard<'_, Counter> {
        self.counter.lock().unwrap_or_else(|e| e.into_inner())
    }
}
