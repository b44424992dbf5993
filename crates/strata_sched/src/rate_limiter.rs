//! Rate limiting of offscreen GPU contexts
//!
//! A context that renders faster than the compositor consumes its frames
//! would otherwise monopolize the GPU process. While a [`RateLimiter`] is
//! active it periodically forces the context to wait on the compositor
//! (`rate_limit_offscreen_context`) and tells the client (`rate_limit`), then
//! reschedules itself through the thread proxy.
//!
//! `start`/`stop` belong to the owning compositor thread. The limiter never
//! owns its context or client: both are held weakly and forgotten on `stop`.

use crate::ScopedThreadProxy;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

/// One 60 Hz frame.
pub const DEFAULT_RATE_LIMIT_INTERVAL: Duration = Duration::from_micros(16_666);

/// Identity of a GPU context, used as the registry key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Receives a callback every time the limiter throttles its context.
pub trait RateLimiterClient: Send + Sync {
    fn rate_limit(&self);
}

/// The throttled GPU context.
pub trait RateLimitedContext: Send + Sync {
    fn context_id(&self) -> ContextId;

    /// Insert a wait on the compositor's progress into the context's stream.
    fn rate_limit_offscreen_context(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active,
    Stopped,
}

struct LimiterState {
    phase: Phase,
    context: Option<Weak<dyn RateLimitedContext>>,
    client: Option<Weak<dyn RateLimiterClient>>,
}

pub struct RateLimiter {
    id: ContextId,
    proxy: Arc<ScopedThreadProxy>,
    interval: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn create(
        context: &Arc<dyn RateLimitedContext>,
        client: Weak<dyn RateLimiterClient>,
        proxy: Arc<ScopedThreadProxy>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: context.context_id(),
            proxy,
            interval,
            state: Mutex::new(LimiterState {
                phase: Phase::Idle,
                context: Some(Arc::downgrade(context)),
                client: Some(client),
            }),
        })
    }

    pub fn context_id(&self) -> ContextId {
        self.id
    }

    /// Begin throttling. A no-op while already active or once stopped.
    pub fn start(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            match state.phase {
                Phase::Active => {
                    tracing::trace!(context = %self.id, "rate limiter already active");
                    return;
                }
                Phase::Stopped => {
                    tracing::debug!(context = %self.id, "ignoring start on a stopped rate limiter");
                    return;
                }
                Phase::Idle => state.phase = Phase::Active,
            }
        }
        tracing::debug!(context = %self.id, "rate limiter started");
        self.schedule_check(Duration::ZERO);
    }

    /// Stop throttling and forget the context and client. Any recheck
    /// already queued becomes a no-op.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.phase = Phase::Stopped;
        state.context = None;
        state.client = None;
        tracing::debug!(context = %self.id, "rate limiter stopped");
    }

    /// Active and still able to post rechecks to the target thread.
    pub fn is_active(&self) -> bool {
        self.lock().phase == Phase::Active && !self.proxy.is_shutdown()
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().phase == Phase::Stopped
    }

    /// Throttle once right now, without touching the recurring schedule.
    /// Returns whether the context and client were reached.
    pub fn rate_limit_now(&self) -> bool {
        let Some((context, client)) = self.live_targets() else {
            return false;
        };
        context.rate_limit_offscreen_context();
        client.rate_limit();
        true
    }

    fn schedule_check(self: &Arc<Self>, delay: Duration) {
        let limiter = Arc::clone(self);
        let accepted = self
            .proxy
            .post_delayed_task(move || limiter.run_check(), delay);
        if !accepted {
            tracing::warn!(context = %self.id, "rate limit recheck rejected by runner");
        }
    }

    fn run_check(self: Arc<Self>) {
        if !self.rate_limit_now() {
            return;
        }
        self.schedule_check(self.interval);
    }

    fn live_targets(&self) -> Option<(Arc<dyn RateLimitedContext>, Arc<dyn RateLimiterClient>)> {
        let mut state = self.lock();
        if state.phase != Phase::Active {
            return None;
        }
        let context = state.context.as_ref().and_then(Weak::upgrade);
        let client = state.client.as_ref().and_then(Weak::upgrade);
        match (context, client) {
            (Some(context), Some(client)) => Some((context, client)),
            _ => {
                // Owner went away without stopping us.
                state.phase = Phase::Stopped;
                state.context = None;
                state.client = None;
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-context rate limiters owned by one compositor host.
pub struct RateLimiterRegistry {
    proxy: Arc<ScopedThreadProxy>,
    client: Weak<dyn RateLimiterClient>,
    interval: Duration,
    limiters: DashMap<ContextId, Arc<RateLimiter>>,
    suspended: AtomicBool,
}

impl RateLimiterRegistry {
    pub fn new(
        proxy: Arc<ScopedThreadProxy>,
        client: Weak<dyn RateLimiterClient>,
        interval: Duration,
    ) -> Self {
        Self {
            proxy,
            client,
            interval,
            limiters: DashMap::new(),
            suspended: AtomicBool::new(false),
        }
    }

    /// While suspended (e.g. the host is animating) new start requests are ignored.
    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::Relaxed);
    }

    /// Start (or keep running) the limiter for `context`.
    pub fn start(&self, context: &Arc<dyn RateLimitedContext>) {
        if self.suspended.load(Ordering::Relaxed) {
            return;
        }
        let id = context.context_id();
        // A limiter that stopped itself (owner dropped) is replaced.
        self.limiters.remove_if(&id, |_, limiter| limiter.is_stopped());
        let limiter = self
            .limiters
            .entry(id)
            .or_insert_with(|| {
                RateLimiter::create(
                    context,
                    self.client.clone(),
                    Arc::clone(&self.proxy),
                    self.interval,
                )
            })
            .clone();
        limiter.start();
    }

    /// Stop and forget the limiter for `id`. Unknown ids are ignored.
    pub fn stop(&self, id: ContextId) {
        if let Some((_, limiter)) = self.limiters.remove(&id) {
            limiter.stop();
        }
    }

    pub fn stop_all(&self) {
        let ids: Vec<ContextId> = self.limiters.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.stop(id);
        }
    }

    pub fn is_active(&self, id: ContextId) -> bool {
        self.limiters
            .get(&id)
            .map_or(false, |limiter| limiter.is_active())
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl Drop for RateLimiterRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
