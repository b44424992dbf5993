//! Deterministic task runner driven by a virtual clock
//!
//! Nothing runs until the owner calls [`ManualTaskRunner::run_until_idle`] or
//! [`ManualTaskRunner::advance`]. Tasks due at the same virtual instant run in
//! post order. Other threads may post; only the creating thread counts as the
//! runner's own thread.

use crate::{Clock, Task, TaskRunner};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::Duration;

struct Pending {
    due: Duration,
    seq: u64,
    task: Task,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Reversed so the max-heap pops the earliest (due, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Pending>,
}

pub struct ManualTaskRunner {
    name: String,
    owner: ThreadId,
    state: Mutex<ManualState>,
}

impl ManualTaskRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: std::thread::current().id(),
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Run every task already due, including ones posted while running.
    /// Returns the number of tasks executed.
    pub fn run_until_idle(&self) -> usize {
        let now = self.lock().now;
        self.run_due(now)
    }

    /// Move the virtual clock forward by `delta`, running tasks as they come due.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.lock().now + delta;
        let ran = self.run_due(target);
        self.lock().now = target;
        ran
    }

    /// Run only the earliest pending task, jumping the clock to its due time.
    pub fn run_next_task(&self) -> bool {
        let next = {
            let mut state = self.lock();
            let next = state.queue.pop();
            if let Some(pending) = &next {
                state.now = state.now.max(pending.due);
            }
            next
        };
        match next {
            Some(pending) => {
                (pending.task)();
                true
            }
            None => false,
        }
    }

    pub fn pending_task_count(&self) -> usize {
        self.lock().queue.len()
    }

    /// Delay from now until the earliest pending task.
    pub fn next_pending_delay(&self) -> Option<Duration> {
        let state = self.lock();
        state
            .queue
            .peek()
            .map(|pending| pending.due.saturating_sub(state.now))
    }

    /// Drop every pending task without running it.
    pub fn clear_pending(&self) {
        self.lock().queue.clear();
    }

    fn run_due(&self, until: Duration) -> usize {
        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.lock();
                match state.queue.peek() {
                    Some(pending) if pending.due <= until => {
                        let pending = state.queue.pop();
                        if let Some(pending) = &pending {
                            state.now = state.now.max(pending.due);
                        }
                        pending
                    }
                    _ => None,
                }
            };
            // Lock released: tasks may post more work.
            match next {
                Some(pending) => {
                    (pending.task)();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TaskRunner for ManualTaskRunner {
    fn post_delayed_task(&self, task: Task, delay: Duration) -> bool {
        let mut state = self.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Pending { due, seq, task });
        true
    }

    fn runs_tasks_on_current_thread(&self) -> bool {
        std::thread::current().id() == self.owner
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Clock for ManualTaskRunner {
    fn now(&self) -> Duration {
        self.lock().now
    }
}
