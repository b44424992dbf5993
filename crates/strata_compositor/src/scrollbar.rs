//! Scrollbar fade-out
//!
//! Scrollbars show on scroll, stay fully opaque for `fade_delay`, then fade
//! linearly to transparent over `fade_duration`. A pinch gesture holds them
//! visible until it ends.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_sched::{Clock, ScopedThreadProxy};

pub const DEFAULT_FADE_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_FADE_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct ScrollbarAnimationController {
    fade_delay: Duration,
    fade_duration: Duration,
    /// `None` until the first scroll: scrollbars start hidden.
    last_awaken_time: Option<Duration>,
    pinch_gesture_in_effect: bool,
    opacity: f32,
}

impl ScrollbarAnimationController {
    pub fn new(fade_delay: Duration, fade_duration: Duration) -> Self {
        Self {
            fade_delay,
            fade_duration,
            last_awaken_time: None,
            pinch_gesture_in_effect: false,
            opacity: 0.0,
        }
    }

    pub fn did_scroll_update(&mut self, now: Duration) {
        if self.pinch_gesture_in_effect {
            return;
        }
        self.last_awaken_time = Some(now);
        self.opacity = 1.0;
    }

    pub fn did_pinch_gesture_begin(&mut self) {
        self.pinch_gesture_in_effect = true;
        self.opacity = 1.0;
    }

    pub fn did_pinch_gesture_update(&mut self) {
        self.pinch_gesture_in_effect = true;
    }

    pub fn did_pinch_gesture_end(&mut self, now: Duration) {
        self.pinch_gesture_in_effect = false;
        self.last_awaken_time = Some(now);
    }

    /// Update the opacity for `now`. Returns true while further frames are
    /// needed to finish the fade.
    pub fn animate(&mut self, now: Duration) -> bool {
        self.opacity = self.opacity_at(now);
        self.opacity > 0.0
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch_gesture_in_effect
    }

    fn opacity_at(&self, now: Duration) -> f32 {
        if self.pinch_gesture_in_effect {
            return 1.0;
        }
        let Some(awaken) = self.last_awaken_time else {
            return 0.0;
        };
        let elapsed = now.saturating_sub(awaken);
        if elapsed <= self.fade_delay {
            return 1.0;
        }
        let fade_end = self.fade_delay + self.fade_duration;
        if elapsed < fade_end {
            return (fade_end - elapsed).as_secs_f32() / self.fade_duration.as_secs_f32();
        }
        0.0
    }
}

impl Default for ScrollbarAnimationController {
    fn default() -> Self {
        Self::new(DEFAULT_FADE_DELAY, DEFAULT_FADE_DURATION)
    }
}

/// Receives the opacity after every fade frame.
pub type OpacitySink = Box<dyn Fn(f32) + Send + Sync>;

struct FadeLoop {
    controller: Arc<Mutex<ScrollbarAnimationController>>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    sink: OpacitySink,
}

impl FadeLoop {
    fn post(self: &Arc<Self>, proxy: &Arc<ScopedThreadProxy>, delay: Duration) -> bool {
        let fade = Arc::clone(self);
        let next = Arc::clone(proxy);
        proxy.post_delayed_task(move || fade.frame(&next), delay)
    }

    fn frame(self: &Arc<Self>, proxy: &Arc<ScopedThreadProxy>) {
        let now = self.clock.now();
        let (more, opacity) = {
            let mut controller = self.controller.lock().unwrap_or_else(|e| e.into_inner());
            (controller.animate(now), controller.opacity())
        };
        (self.sink)(opacity);
        if more {
            self.post(proxy, self.interval);
        } else {
            tracing::trace!("scrollbar fade finished");
        }
    }
}

/// Drive `controller` on the proxy's thread, one frame per `interval`,
/// until the fade completes or the proxy shuts down. The first frame runs on
/// the next turn of the target thread.
pub fn run_fade(
    controller: Arc<Mutex<ScrollbarAnimationController>>,
    proxy: &Arc<ScopedThreadProxy>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    sink: OpacitySink,
) -> bool {
    let fade = Arc::new(FadeLoop {
        controller,
        clock,
        interval,
        sink,
    });
    fade.post(proxy, Duration::ZERO)
}
