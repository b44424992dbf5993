//! Task runners: the "target thread" abstraction
//!
//! A [`TaskRunner`] accepts closures from any thread and runs them, in post
//! order, on the one thread it owns. [`ThreadTaskRunner`] is the production
//! implementation: a dedicated OS thread driving a current-thread tokio
//! runtime, so delayed tasks are plain `tokio::time::sleep`s.

use crate::SchedulerError;
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;
use tokio::sync::mpsc;

/// Unit of work posted to a runner.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs tasks on one fixed thread.
pub trait TaskRunner: Send + Sync {
    /// Queue `task` to run after `delay`. Returns `false` when the runner no
    /// longer accepts work; the task is dropped unrun in that case.
    fn post_delayed_task(&self, task: Task, delay: Duration) -> bool;

    /// True when called from the thread this runner executes tasks on.
    fn runs_tasks_on_current_thread(&self) -> bool;

    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    fn post_task(&self, task: Task) -> bool {
        self.post_delayed_task(task, Duration::ZERO)
    }
}

struct Posted {
    task: Task,
    delay: Duration,
}

/// A named thread executing posted tasks on a current-thread tokio runtime.
///
/// Zero-delay tasks run in FIFO order. Delayed tasks run once their sleep
/// elapses. Stopping the runner (explicitly or on drop) closes the queue,
/// lets already-queued zero-delay tasks finish and discards pending delayed
/// tasks.
pub struct ThreadTaskRunner {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<mpsc::UnboundedSender<Posted>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTaskRunner {
    pub fn spawn(name: impl Into<String>) -> Result<Arc<Self>, SchedulerError> {
        let name = name.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|source| SchedulerError::Runtime {
                runner: name.clone(),
                source,
            })?;

        let (sender, mut receiver) = mpsc::unbounded_channel::<Posted>();
        let thread_name = name.clone();
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(Posted { task, delay }) = receiver.recv().await {
                        if delay.is_zero() {
                            task();
                        } else {
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                task();
                            });
                        }
                    }
                });
                tracing::debug!(runner = %thread_name, "task runner drained");
            })
            .map_err(|source| SchedulerError::Spawn {
                runner: name.clone(),
                source,
            })?;

        let thread_id = handle.thread().id();
        tracing::debug!(runner = %name, "task runner started");
        Ok(Arc::new(Self {
            name,
            thread_id,
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        }))
    }

    /// Run `f` on the runner thread and block the caller until it returns.
    ///
    /// Must not be called from the runner thread itself.
    pub fn call_blocking<F, R>(&self, f: F) -> Result<R, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.runs_tasks_on_current_thread() {
            return Ok(f());
        }
        let (tx, rx) = std_mpsc::sync_channel(1);
        let accepted = self.post_task(Box::new(move || {
            let _ = tx.send(f());
        }));
        if !accepted {
            return Err(self.stopped_error());
        }
        rx.recv().map_err(|_| self.stopped_error())
    }

    /// Stop accepting tasks and wait for the runner thread to exit.
    pub fn stop(&self) {
        let sender = self.lock_sender().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        if self.runs_tasks_on_current_thread() {
            // Joining ourselves would deadlock; the loop exits once this task returns.
            return;
        }
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(runner = %self.name, "task runner thread panicked");
            }
        }
        tracing::debug!(runner = %self.name, "task runner stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.lock_sender().is_none()
    }

    fn lock_sender(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<Posted>>> {
        self.sender.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stopped_error(&self) -> SchedulerError {
        SchedulerError::RunnerStopped {
            runner: self.name.clone(),
        }
    }
}

impl TaskRunner for ThreadTaskRunner {
    fn post_delayed_task(&self, task: Task, delay: Duration) -> bool {
        match self.lock_sender().as_ref() {
            Some(sender) => sender.send(Posted { task, delay }).is_ok(),
            None => false,
        }
    }

    fn runs_tasks_on_current_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ThreadTaskRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
