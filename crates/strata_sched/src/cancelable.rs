//! Cancelable callbacks
//!
//! [`cancelable`] wraps a closure so that a [`CancelHandle`] can turn it into
//! a no-op after it has been posted. [`CancelableSlot`] holds at most one such
//! handle; filling it again cancels whatever was there.

use crate::Task;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Wrap `f` so that it only runs if its handle has not been canceled.
pub fn cancelable<F>(f: F) -> (Task, CancelHandle)
where
    F: FnOnce() + Send + 'static,
{
    let handle = CancelHandle::default();
    let guard = handle.clone();
    let task: Task = Box::new(move || {
        if !guard.is_canceled() {
            f();
        }
    });
    (task, handle)
}

/// Holds the one outstanding cancelable callback, if any.
#[derive(Debug, Default)]
pub struct CancelableSlot {
    current: Option<CancelHandle>,
}

impl CancelableSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `f`, cancel any previous occupant and return the task to post.
    pub fn reset<F>(&mut self, f: F) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        let (task, handle) = cancelable(f);
        if let Some(previous) = self.current.replace(handle) {
            previous.cancel();
        }
        task
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.cancel();
        }
    }

    /// True while a callback is held and has not been canceled.
    pub fn is_pending(&self) -> bool {
        self.current
            .as_ref()
            .map_or(false, |handle| !handle.is_canceled())
    }
}
