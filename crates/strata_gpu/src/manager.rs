//! The GPU memory manager
//!
//! Owns the budget, decides per-stub allocations in coalesced passes and
//! keeps the running tally reported by tracking groups. Everything that
//! mutates state is expected on the target thread the manager was created
//! on; posts to that thread go through a [`ScopedThreadProxy`] so a pass
//! queued before [`GpuMemoryManager::shutdown`] never runs after it.

use crate::policy::{plan_pass, BudgetBounds};
use crate::{
    CommandBufferStub, GpuMemoryConfig, GpuMemoryError, GpuMemoryManagerClient,
    GpuMemoryTrackingGroup, GpuVideoMemoryUsageStats, ManageBreakdown, StubId, StubMemoryStat,
    TrackingGroupId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use strata_env::PlatformLimits;
use strata_metrics::{Counter, PassTimer};
use strata_sched::{CancelableSlot, ScopedThreadProxy, TaskRunner};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManagerMetricsSummary {
    pub passes: u64,
    pub average_ms: f64,
    pub max_ms: f64,
    /// Tracked growth that pushed usage past the budget.
    pub over_budget_events: u64,
}

#[derive(Debug, Clone, Copy)]
struct TrackingGroupRecord {
    pid: u32,
    size: u64,
}

struct ManagerState {
    total_gpu_memory_override: Option<u64>,
    bytes_available_gpu_memory: u64,
    max_surfaces_with_frontbuffer_soft_limit: usize,
    window_count: Option<u32>,

    manage_immediate_scheduled: bool,
    delayed_manage: CancelableSlot,
    shut_down: bool,

    tracking_groups: HashMap<TrackingGroupId, TrackingGroupRecord>,
    next_tracking_group_id: u64,
    bytes_allocated_current: u64,
    bytes_allocated_historical_max: u64,

    stub_memory_stats_for_last_manage: Arc<HashMap<StubId, StubMemoryStat>>,
    last_breakdown: ManageBreakdown,
}

#[derive(Default)]
struct ManagerMetrics {
    pass_timer: PassTimer,
    counter: Counter,
}

pub struct GpuMemoryManager {
    client: Arc<dyn GpuMemoryManagerClient>,
    proxy: Arc<ScopedThreadProxy>,
    self_ref: Weak<GpuMemoryManager>,
    limits: PlatformLimits,
    delayed_manage_delay: Duration,
    state: Mutex<ManagerState>,
    metrics: Mutex<ManagerMetrics>,
}

impl GpuMemoryManager {
    /// Create a manager bound to `runner`'s thread. Must be called on that thread.
    pub fn new(
        client: Arc<dyn GpuMemoryManagerClient>,
        runner: Arc<dyn TaskRunner>,
        config: GpuMemoryConfig,
    ) -> Result<Arc<Self>, GpuMemoryError> {
        config.validate()?;
        let proxy = ScopedThreadProxy::create(runner)?;
        let limits = config.limits();
        let soft_limit = config
            .max_surfaces_with_frontbuffer_soft_limit
            .unwrap_or(limits.max_surfaces_with_frontbuffer_soft_limit);
        let bytes_available = resolve_available_bytes(config.total_gpu_memory_bytes, None, &limits);

        debug!(
            platform = %limits.platform,
            bytes_available,
            soft_limit,
            window_count = ?config.window_count,
            "gpu memory manager created"
        );

        Ok(Arc::new_cyclic(|self_ref| Self {
            client,
            proxy,
            self_ref: self_ref.clone(),
            limits,
            delayed_manage_delay: config.delayed_manage_delay(),
            state: Mutex::new(ManagerState {
                total_gpu_memory_override: config.total_gpu_memory_bytes,
                bytes_available_gpu_memory: bytes_available,
                max_surfaces_with_frontbuffer_soft_limit: soft_limit,
                window_count: config.window_count,
                manage_immediate_scheduled: false,
                delayed_manage: CancelableSlot::new(),
                shut_down: false,
                tracking_groups: HashMap::new(),
                next_tracking_group_id: 1,
                bytes_allocated_current: 0,
                bytes_allocated_historical_max: 0,
                stub_memory_stats_for_last_manage: Arc::new(HashMap::new()),
                last_breakdown: ManageBreakdown::default(),
            }),
            metrics: Mutex::new(ManagerMetrics::default()),
        }))
    }

    /// Ask for a budget pass.
    ///
    /// Immediate requests run on the next turn of the target thread and
    /// supersede a pending delayed one. Delayed requests coalesce: while one
    /// is pending, or an immediate pass is already queued, further requests
    /// are no-ops.
    pub fn schedule_manage(&self, immediate: bool) {
        let mut state = self.lock();
        if state.shut_down || state.manage_immediate_scheduled {
            return;
        }

        let manager = self.self_ref.clone();
        let run = move || {
            if let Some(manager) = manager.upgrade() {
                manager.manage();
            }
        };

        if immediate {
            state.delayed_manage.cancel();
            state.manage_immediate_scheduled = true;
            drop(state);
            if !self.proxy.post_task(run) {
                self.lock().manage_immediate_scheduled = false;
            }
        } else {
            if state.delayed_manage.is_pending() {
                return;
            }
            let task = state.delayed_manage.reset(run);
            drop(state);
            if !self.proxy.post_delayed_task(task, self.delayed_manage_delay) {
                self.lock().delayed_manage.cancel();
            }
        }
    }

    /// Run one budget pass now and push the results to every stub.
    ///
    /// Stubs and the client are consulted with no manager lock held, so they
    /// may call back into the manager (for example to read a tracking group).
    pub fn manage(&self) {
        self.assert_on_target_thread("manage");

        let (total_override, soft_limit, window_count) = {
            let mut state = self.lock();
            state.manage_immediate_scheduled = false;
            state.delayed_manage.cancel();
            if state.shut_down {
                return;
            }
            (
                state.total_gpu_memory_override,
                state.max_surfaces_with_frontbuffer_soft_limit,
                state.window_count,
            )
        };

        let mut stubs: Vec<Arc<dyn CommandBufferStub>> = Vec::new();
        self.client.append_all_command_buffer_stubs(&mut stubs);
        let driver_total = self.client.total_gpu_memory_bytes();
        let bytes_available = resolve_available_bytes(total_override, driver_total, &self.limits);
        let bounds = BudgetBounds::new(&self.limits, bytes_available, soft_limit, window_count);

        let started = Instant::now();
        let plan = plan_pass(&stubs, &bounds);
        self.metrics().pass_timer.record(started.elapsed());

        let stats: HashMap<StubId, StubMemoryStat> = plan
            .assignments
            .iter()
            .map(|assignment| {
                (
                    assignment.stub,
                    StubMemoryStat {
                        visible: assignment.visible,
                        allocation: assignment.allocation,
                    },
                )
            })
            .collect();

        {
            let mut state = self.lock();
            // A stub callback may have shut us down mid-pass.
            if state.shut_down {
                return;
            }
            state.bytes_available_gpu_memory = bytes_available;
            state.stub_memory_stats_for_last_manage = Arc::new(stats);
            state.last_breakdown = ManageBreakdown {
                visible_stubs: plan.visible_stubs,
                hidden_stubs: plan.hidden_stubs,
                offscreen_stubs: plan.offscreen_stubs,
                visible_bytes: plan.visible_bytes,
                hidden_bytes: plan.hidden_bytes,
            };

            debug!(
                stubs = stubs.len(),
                visible = plan.visible_stubs,
                hidden = plan.hidden_stubs,
                offscreen = plan.offscreen_stubs,
                assigned = plan.charged_bytes(),
                available = bounds.total_bytes,
                tracked = state.bytes_allocated_current,
                "manage pass"
            );
        }

        for (stub, assignment) in stubs.iter().zip(&plan.assignments) {
            trace!(stub = %assignment.stub, allocation = ?assignment.allocation, "allocation");
            stub.set_memory_allocation(&assignment.allocation);
        }
    }

    /// True while a pass is queued and has not run yet.
    pub fn is_manage_scheduled(&self) -> bool {
        let state = self.lock();
        state.manage_immediate_scheduled || state.delayed_manage.is_pending()
    }

    /// Snapshot of the last pass. Replaced wholesale by every pass.
    pub fn stub_memory_stats_for_last_manage(&self) -> Arc<HashMap<StubId, StubMemoryStat>> {
        Arc::clone(&self.lock().stub_memory_stats_for_last_manage)
    }

    pub fn get_video_memory_usage_stats(&self) -> GpuVideoMemoryUsageStats {
        let state = self.lock();
        let mut stats = GpuVideoMemoryUsageStats {
            bytes_allocated: state.bytes_allocated_current,
            bytes_allocated_historical_max: state.bytes_allocated_historical_max,
            bytes_available: state.bytes_available_gpu_memory,
            last_manage: state.last_breakdown,
            ..Default::default()
        };
        for record in state.tracking_groups.values() {
            let process = stats.process_map.entry(record.pid).or_default();
            process.video_memory += record.size;
            process.tracking_groups += 1;
        }
        stats
    }

    /// Switch to (or, with `None`, out of) window-count budgeting. Triggers an
    /// immediate pass.
    pub fn set_window_count(&self, window_count: Option<u32>) {
        {
            let mut state = self.lock();
            let window_count = window_count.map(|count| count.max(1));
            if state.window_count == window_count {
                return;
            }
            state.window_count = window_count;
        }
        self.schedule_manage(true);
    }

    /// Register a tracking group for process `pid` and return its id.
    pub fn add_tracking_group(&self, pid: u32) -> TrackingGroupId {
        self.assert_on_target_thread("add_tracking_group");
        let mut state = self.lock();
        let id = TrackingGroupId(state.next_tracking_group_id);
        state.next_tracking_group_id += 1;
        state
            .tracking_groups
            .insert(id, TrackingGroupRecord { pid, size: 0 });
        trace!(group = %id, pid, "tracking group added");
        id
    }

    /// Register a tracking group and hand back an owning handle that
    /// deregisters itself on drop.
    pub fn create_tracking_group(&self, pid: u32) -> GpuMemoryTrackingGroup {
        let id = self.add_tracking_group(pid);
        GpuMemoryTrackingGroup::new(id, pid, self.self_ref.clone())
    }

    /// Forget `id`, releasing whatever it still held. Unknown ids are ignored.
    pub fn remove_tracking_group(&self, id: TrackingGroupId) {
        self.assert_on_target_thread("remove_tracking_group");
        let mut state = self.lock();
        match state.tracking_groups.remove(&id) {
            Some(record) => {
                state.bytes_allocated_current =
                    state.bytes_allocated_current.saturating_sub(record.size);
                trace!(group = %id, released = record.size, "tracking group removed");
            }
            None => debug!(group = %id, "removing unknown tracking group"),
        }
    }

    /// Record that group `id` went from `old_size` to `new_size` bytes. Growth
    /// past the available budget schedules a delayed pass.
    pub fn track_memory_allocated_change(&self, id: TrackingGroupId, old_size: u64, new_size: u64) {
        self.assert_on_target_thread("track_memory_allocated_change");
        let over_budget = {
            let mut state = self.lock();
            match state.tracking_groups.get_mut(&id) {
                Some(record) => {
                    debug_assert!(record.size >= old_size, "group {id} shrank below zero");
                    record.size = record.size.saturating_sub(old_size) + new_size;
                }
                None => {
                    debug!(group = %id, "allocation change for unknown tracking group");
                    return;
                }
            }
            state.bytes_allocated_current =
                state.bytes_allocated_current.saturating_sub(old_size) + new_size;
            state.bytes_allocated_historical_max = state
                .bytes_allocated_historical_max
                .max(state.bytes_allocated_current);
            new_size > old_size && state.bytes_allocated_current > state.bytes_available_gpu_memory
        };
        if over_budget {
            debug!(group = %id, "tracked memory over budget");
            self.metrics().counter.increment("over_budget", 1);
            self.schedule_manage(false);
        }
    }

    pub fn tracking_group_size(&self, id: TrackingGroupId) -> Option<u64> {
        self.lock().tracking_groups.get(&id).map(|record| record.size)
    }

    pub fn tracking_group_count(&self) -> usize {
        self.lock().tracking_groups.len()
    }

    pub fn bytes_allocated_current(&self) -> u64 {
        self.lock().bytes_allocated_current
    }

    /// Never decreases.
    pub fn bytes_allocated_historical_max(&self) -> u64 {
        self.lock().bytes_allocated_historical_max
    }

    pub fn bytes_available_gpu_memory(&self) -> u64 {
        self.lock().bytes_available_gpu_memory
    }

    pub fn limits(&self) -> &PlatformLimits {
        &self.limits
    }

    /// Drop any queued pass and stop accepting new ones. Must be called once,
    /// on the target thread; later calls are ignored.
    pub fn shutdown(&self) {
        {
            let mut state = self.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            state.manage_immediate_scheduled = false;
            state.delayed_manage.cancel();
        }
        self.proxy.shutdown();
        debug!("gpu memory manager shut down");
    }

    pub fn metrics_summary(&self) -> ManagerMetricsSummary {
        let metrics = self.metrics();
        ManagerMetricsSummary {
            passes: metrics.pass_timer.passes(),
            average_ms: metrics.pass_timer.average_ms(),
            max_ms: metrics.pass_timer.max_ms(),
            over_budget_events: metrics.counter.get("over_budget"),
        }
    }

    fn assert_on_target_thread(&self, operation: &str) {
        debug_assert!(
            self.proxy.runner().runs_tasks_on_current_thread(),
            "GpuMemoryManager::{operation} called off the target thread"
        );
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn metrics(&self) -> MutexGuard<'_, ManagerMetrics> {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Configured override, else what the driver reports, else the platform default.
fn resolve_available_bytes(
    override_bytes: Option<u64>,
    driver_bytes: Option<u64>,
    limits: &PlatformLimits,
) -> u64 {
    override_bytes
        .or(driver_bytes.filter(|&bytes| bytes > 0))
        .unwrap_or(limits.default_total_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::fakes::*;
    use crate::{ConfigError, GpuMemoryAllocation, SurfaceState};
    use strata_env::{Platform, MIB};
    use strata_sched::ManualTaskRunner;

    struct Harness {
        runner: Arc<ManualTaskRunner>,
        client: Arc<FakeClient>,
        manager: Arc<GpuMemoryManager>,
    }

    impl Harness {
        fn with_config(config: GpuMemoryConfig) -> Self {
            let runner = Arc::new(ManualTaskRunner::new("gpu-test"));
            let client = Arc::new(FakeClient::default());
            let manager = GpuMemoryManager::new(client.clone(), runner.clone(), config).unwrap();
            Self {
                runner,
                client,
                manager,
            }
        }

        /// Desktop limits with a small frontbuffer limit so it is easy to cross.
        fn new() -> Self {
            Self::with_config(
                GpuMemoryConfig::default()
                    .with_platform(Platform::Desktop)
                    .with_frontbuffer_soft_limit(3),
            )
        }

        fn add_surface(&self, surface_id: i32, visible: bool, last_used_ms: u64) -> Arc<FakeSurfaceStub> {
            let stub = FakeSurfaceStub::new(surface_id, visible, last_used_ms);
            self.client.push(stub.clone());
            stub
        }

        fn add_offscreen(&self, group: &[&Arc<FakeSurfaceStub>]) -> Arc<FakeOffscreenStub> {
            let stub = FakeOffscreenStub::sharing_with(group);
            self.client.push(stub.clone());
            stub
        }

        fn manage(&self) {
            self.manager.manage();
        }
    }

    const OLDER: u64 = 1;
    const NEWER: u64 = 2;
    const NEWEST: u64 = 3;

    fn all_buffers(a: GpuMemoryAllocation) -> bool {
        a.suggest_have_frontbuffer && a.suggest_have_backbuffer
    }

    fn front_only(a: GpuMemoryAllocation) -> bool {
        a.suggest_have_frontbuffer && !a.suggest_have_backbuffer
    }

    fn no_buffers(a: GpuMemoryAllocation) -> bool {
        !a.suggest_have_frontbuffer && !a.suggest_have_backbuffer
    }

    // Visible surfaces keep both buffers, hidden keep only the frontbuffer, and
    // offscreen stubs follow whichever surface they share a group with.
    #[test]
    fn basic_allocation_flags() {
        let h = Harness::new();
        let a = h.add_surface(1, true, OLDER);
        let b = h.add_surface(2, false, OLDER);
        h.manage();
        assert!(all_buffers(a.allocation()));
        assert!(front_only(b.allocation()));

        let c = h.add_offscreen(&[&a]);
        let d = h.add_offscreen(&[&b]);
        h.manage();
        assert!(all_buffers(a.allocation()));
        assert!(front_only(b.allocation()));
        assert!(all_buffers(c.allocation()));
        assert!(front_only(d.allocation()));
    }

    #[test]
    fn changing_visibility_follows_on_next_pass() {
        let h = Harness::new();
        let a = h.add_surface(1, true, OLDER);
        let b = h.add_surface(2, false, OLDER);
        let c = h.add_offscreen(&[&a]);
        let d = h.add_offscreen(&[&b]);
        h.manage();
        assert!(all_buffers(c.allocation()));
        assert!(front_only(d.allocation()));

        a.set_visible(false);
        b.set_visible(true);
        h.manage();
        assert!(front_only(a.allocation()));
        assert!(all_buffers(b.allocation()));
        assert!(front_only(c.allocation()));
        assert!(all_buffers(d.allocation()));
    }

    #[test]
    fn many_visible_stubs_all_keep_buffers() {
        let h = Harness::new();
        let stubs: Vec<_> = (1..=4).map(|i| h.add_surface(i, true, OLDER)).collect();
        let offscreen = h.add_offscreen(&[&stubs[0]]);
        h.manage();
        for stub in &stubs {
            assert!(all_buffers(stub.allocation()));
        }
        assert!(all_buffers(offscreen.allocation()));
    }

    #[test]
    fn hidden_stubs_past_soft_limit_drop_everything() {
        let h = Harness::new();
        let stubs: Vec<_> = (1..=3).map(|i| h.add_surface(i, false, NEWER)).collect();
        let oldest = h.add_surface(4, false, OLDER);
        let c = h.add_offscreen(&[&stubs[0]]);
        let d = h.add_offscreen(&[&oldest]);
        h.manage();
        for stub in &stubs {
            assert!(front_only(stub.allocation()));
        }
        assert!(no_buffers(oldest.allocation()));
        assert!(front_only(c.allocation()));
        assert!(no_buffers(d.allocation()));
        assert_eq!(oldest.allocation().gpu_resource_size_in_bytes, 0);
    }

    #[test]
    fn changing_last_used_time_reorders_hidden_stubs() {
        let h = Harness::new();
        let stubs: Vec<_> = (1..=3).map(|i| h.add_surface(i, false, NEWER)).collect();
        let late = h.add_surface(4, false, OLDER);
        h.manage();
        assert!(no_buffers(late.allocation()));

        stubs[2].set_last_used_ms(OLDER);
        late.set_last_used_ms(NEWER);
        h.manage();
        assert!(front_only(late.allocation()));
        assert!(no_buffers(stubs[2].allocation()));
    }

    // An offscreen stub shared by two surfaces mirrors the more important one.
    #[test]
    fn shared_offscreen_stub_follows_most_important_surface() {
        let h = Harness::new();
        let _visible = h.add_surface(10, true, NEWER);
        let _hidden_b = h.add_surface(11, false, NEWER);
        let _hidden_c = h.add_surface(12, false, NEWER);
        let s1 = h.add_surface(1, true, NEWEST);
        let s2 = h.add_surface(2, true, NEWEST);
        let shared = h.add_offscreen(&[&s1, &s2]);

        h.manage();
        assert_eq!(shared.allocation(), s1.allocation());
        assert_eq!(shared.allocation(), s2.allocation());
        assert!(all_buffers(shared.allocation()));

        s1.set_visible(false);
        h.manage();
        assert_ne!(shared.allocation(), s1.allocation());
        assert_eq!(shared.allocation(), s2.allocation());

        s2.set_visible(false);
        h.manage();
        assert_eq!(shared.allocation(), s1.allocation());
        assert!(front_only(shared.allocation()));

        s1.set_last_used_ms(OLDER);
        h.manage();
        assert_ne!(shared.allocation(), s1.allocation());
        assert_eq!(shared.allocation(), s2.allocation());
        assert!(front_only(s2.allocation()));
        assert!(no_buffers(s1.allocation()));

        s2.set_last_used_ms(OLDER);
        h.manage();
        assert!(no_buffers(s1.allocation()));
        assert!(no_buffers(s2.allocation()));
        assert!(no_buffers(shared.allocation()));
    }

    #[test]
    fn immediate_then_delayed_request_runs_one_pass() {
        let h = Harness::new();
        h.manager.schedule_manage(true);
        h.manager.schedule_manage(false);
        assert!(h.manager.is_manage_scheduled());

        h.runner.run_until_idle();
        h.runner.advance(Duration::from_secs(1));
        assert_eq!(h.client.enumerations(), 1);
        assert!(!h.manager.is_manage_scheduled());
    }

    #[test]
    fn delayed_requests_coalesce_and_wait_for_the_delay() {
        let h = Harness::new();
        for _ in 0..3 {
            h.manager.schedule_manage(false);
        }
        h.runner.run_until_idle();
        assert_eq!(h.client.enumerations(), 0);

        h.runner.advance(Duration::from_millis(66));
        assert_eq!(h.client.enumerations(), 0);
        h.runner.advance(Duration::from_millis(1));
        assert_eq!(h.client.enumerations(), 1);

        // A fresh request after the pass schedules a new one.
        h.manager.schedule_manage(false);
        h.runner.advance(Duration::from_millis(67));
        assert_eq!(h.client.enumerations(), 2);
    }

    #[test]
    fn immediate_request_supersedes_pending_delayed() {
        let h = Harness::new();
        h.manager.schedule_manage(false);
        h.manager.schedule_manage(true);
        h.runner.run_until_idle();
        assert_eq!(h.client.enumerations(), 1);

        h.runner.advance(Duration::from_secs(1));
        assert_eq!(h.client.enumerations(), 1);
    }

    #[test]
    fn shutdown_drops_queued_passes() {
        let h = Harness::new();
        h.manager.schedule_manage(true);
        h.manager.shutdown();
        h.manager.schedule_manage(false);
        h.runner.advance(Duration::from_secs(1));
        assert_eq!(h.client.enumerations(), 0);
        assert!(!h.manager.is_manage_scheduled());

        // Second call is a no-op.
        h.manager.shutdown();
    }

    #[test]
    fn visible_demand_is_served_first() {
        let h = Harness::with_config(
            GpuMemoryConfig::default()
                .with_platform(Platform::Desktop)
                .with_total_gpu_memory(200 * MIB),
        );
        let a = FakeSurfaceStub::with_request(1, true, OLDER, 100 * MIB);
        let b = FakeSurfaceStub::with_request(2, true, OLDER, 100 * MIB);
        let hidden = FakeSurfaceStub::with_request(3, false, NEWEST, 100 * MIB);
        for stub in [&hidden, &a, &b] {
            h.client.push(stub.clone());
        }
        h.manage();

        assert_eq!(a.allocation().gpu_resource_size_in_bytes, 100 * MIB);
        assert_eq!(b.allocation().gpu_resource_size_in_bytes, 100 * MIB);
        assert_eq!(hidden.allocation().gpu_resource_size_in_bytes, 0);
        assert!(front_only(hidden.allocation()));
    }

    #[test]
    fn single_stub_is_capped_at_half_the_budget() {
        let h = Harness::with_config(GpuMemoryConfig::default().with_platform(Platform::Desktop));
        let greedy = FakeSurfaceStub::with_request(1, true, OLDER, 300 * MIB);
        h.client.push(greedy.clone());
        h.manage();
        assert_eq!(h.manager.bytes_available_gpu_memory(), 256 * MIB);
        assert_eq!(greedy.allocation().gpu_resource_size_in_bytes, 128 * MIB);
    }

    #[test]
    fn budget_prefers_override_then_driver_then_default() {
        let h = Harness::with_config(GpuMemoryConfig::default().with_platform(Platform::Android));
        h.manage();
        assert_eq!(h.manager.bytes_available_gpu_memory(), 64 * MIB);

        *h.client.driver_total.lock().unwrap() = Some(512 * MIB);
        h.manage();
        assert_eq!(h.manager.bytes_available_gpu_memory(), 512 * MIB);

        *h.client.driver_total.lock().unwrap() = Some(0);
        h.manage();
        assert_eq!(h.manager.bytes_available_gpu_memory(), 64 * MIB);

        let h = Harness::with_config(
            GpuMemoryConfig::default()
                .with_platform(Platform::Android)
                .with_total_gpu_memory(96 * MIB),
        );
        *h.client.driver_total.lock().unwrap() = Some(512 * MIB);
        h.manage();
        assert_eq!(h.manager.bytes_available_gpu_memory(), 96 * MIB);
    }

    #[test]
    fn empty_stub_list_yields_empty_stats() {
        let h = Harness::new();
        h.manage();
        assert!(h.manager.stub_memory_stats_for_last_manage().is_empty());
        assert_eq!(h.manager.get_video_memory_usage_stats().last_manage, ManageBreakdown::default());
    }

    #[test]
    fn stats_are_replaced_not_merged() {
        let h = Harness::new();
        let a = h.add_surface(1, true, OLDER);
        let b = h.add_surface(2, false, OLDER);
        h.manage();
        let first = h.manager.stub_memory_stats_for_last_manage();
        assert_eq!(first.len(), 2);
        assert!(first[&a.stub_id()].visible);
        assert!(!first[&b.stub_id()].visible);

        h.client.stubs.lock().unwrap().clear();
        let c = h.add_surface(3, true, NEWER);
        h.manage();
        let second = h.manager.stub_memory_stats_for_last_manage();
        assert_eq!(second.len(), 1);
        assert!(second.contains_key(&c.stub_id()));
        // Earlier snapshots stay intact for whoever still holds them.
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn window_count_splits_budget_evenly() {
        let h = Harness::with_config(
            GpuMemoryConfig::default()
                .with_platform(Platform::Desktop)
                .with_total_gpu_memory(256 * MIB),
        );
        let a = FakeSurfaceStub::with_request(1, true, OLDER, 0);
        let b = FakeSurfaceStub::with_request(2, true, OLDER, 0);
        h.client.push(a.clone());
        h.client.push(b.clone());

        h.manager.set_window_count(Some(4));
        assert!(h.manager.is_manage_scheduled());
        h.runner.run_until_idle();
        assert_eq!(a.allocation().gpu_resource_size_in_bytes, 64 * MIB);
        assert_eq!(b.allocation().gpu_resource_size_in_bytes, 64 * MIB);

        // Same value again does not schedule anything.
        h.manager.set_window_count(Some(4));
        assert!(!h.manager.is_manage_scheduled());
    }

    #[test]
    fn tracking_groups_account_per_process() {
        let h = Harness::new();
        let g1 = h.manager.create_tracking_group(7);
        let g2 = h.manager.create_tracking_group(7);
        let g3 = h.manager.create_tracking_group(9);

        g1.track_memory_allocated_change(0, 10 * MIB);
        g2.track_memory_allocated_change(0, 5 * MIB);
        g3.track_memory_allocated_change(0, MIB);
        g1.track_memory_allocated_change(10 * MIB, 4 * MIB);
        assert_eq!(g1.size(), 4 * MIB);

        let stats = h.manager.get_video_memory_usage_stats();
        assert_eq!(stats.bytes_allocated, 10 * MIB);
        assert_eq!(stats.bytes_allocated_historical_max, 16 * MIB);
        assert_eq!(stats.process_map[&7].video_memory, 9 * MIB);
        assert_eq!(stats.process_map[&7].tracking_groups, 2);
        assert_eq!(stats.process_map[&9].video_memory, MIB);
    }

    #[test]
    fn dropping_a_group_releases_its_bytes_but_not_the_peak() {
        let h = Harness::new();
        let group = h.manager.create_tracking_group(1);
        group.track_memory_allocated_change(0, 8 * MIB);
        let id = group.id();
        drop(group);

        assert_eq!(h.manager.tracking_group_count(), 0);
        assert_eq!(h.manager.bytes_allocated_current(), 0);
        assert_eq!(h.manager.bytes_allocated_historical_max(), 8 * MIB);

        // Already gone: both are no-ops.
        h.manager.remove_tracking_group(id);
        h.manager.track_memory_allocated_change(id, 0, 1);
        assert_eq!(h.manager.bytes_allocated_current(), 0);
    }

    #[test]
    fn growth_past_budget_schedules_delayed_pass() {
        let h = Harness::with_config(
            GpuMemoryConfig::default()
                .with_platform(Platform::Desktop)
                .with_total_gpu_memory(32 * MIB),
        );
        let group = h.manager.create_tracking_group(1);
        group.track_memory_allocated_change(0, 16 * MIB);
        assert!(!h.manager.is_manage_scheduled());

        group.track_memory_allocated_change(16 * MIB, 40 * MIB);
        assert!(h.manager.is_manage_scheduled());
        if cfg!(feature = "metrics") {
            assert_eq!(h.manager.metrics_summary().over_budget_events, 1);
        }
        h.runner.advance(Duration::from_millis(crate::DEFAULT_DELAYED_MANAGE_MS));
        assert_eq!(h.client.enumerations(), 1);

        // Shrinking never asks for a pass.
        group.track_memory_allocated_change(40 * MIB, 36 * MIB);
        assert!(!h.manager.is_manage_scheduled());
    }

    #[test]
    fn creating_off_target_thread_fails() {
        let runner: Arc<dyn TaskRunner> = Arc::new(ManualTaskRunner::new("owner"));
        let client: Arc<dyn GpuMemoryManagerClient> = Arc::new(FakeClient::default());
        let result = std::thread::spawn(move || {
            GpuMemoryManager::new(client, runner, GpuMemoryConfig::default()).map(|_| ())
        })
        .join()
        .unwrap();
        assert!(matches!(result, Err(GpuMemoryError::Scheduler(_))));
    }

    #[test]
    fn zero_frontbuffer_limit_is_rejected() {
        let runner = Arc::new(ManualTaskRunner::new("gpu-test"));
        let client = Arc::new(FakeClient::default());
        let result = GpuMemoryManager::new(
            client,
            runner,
            GpuMemoryConfig::default().with_frontbuffer_soft_limit(0),
        );
        assert!(matches!(
            result,
            Err(GpuMemoryError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    /// Sizes its demand from the tracking group it owns.
    struct GroupSizedStub {
        id: StubId,
        group: Mutex<Option<GpuMemoryTrackingGroup>>,
        allocation: Mutex<GpuMemoryAllocation>,
    }

    impl CommandBufferStub for GroupSizedStub {
        fn stub_id(&self) -> StubId {
            self.id
        }

        fn surface_state(&self) -> Option<SurfaceState> {
            Some(SurfaceState::new(1, true, Duration::ZERO))
        }

        fn is_in_same_context_share_group(&self, _other: &dyn CommandBufferStub) -> bool {
            false
        }

        fn requested_memory_bytes(&self) -> u64 {
            self.group.lock().unwrap().as_ref().map_or(0, |group| group.size())
        }

        fn set_memory_allocation(&self, allocation: &GpuMemoryAllocation) {
            *self.allocation.lock().unwrap() = *allocation;
        }
    }

    #[test]
    fn stubs_can_call_back_into_the_manager_during_a_pass() {
        let h = Harness::with_config(
            GpuMemoryConfig::default()
                .with_platform(Platform::Desktop)
                .with_total_gpu_memory(256 * MIB),
        );
        let group = h.manager.create_tracking_group(1);
        group.track_memory_allocated_change(0, 24 * MIB);
        let stub = Arc::new(GroupSizedStub {
            id: StubId::allocate(),
            group: Mutex::new(Some(group)),
            allocation: Mutex::new(GpuMemoryAllocation::default()),
        });
        h.client.push(stub.clone());

        h.manage();

        let allocation = *stub.allocation.lock().unwrap();
        assert_eq!(allocation.gpu_resource_size_in_bytes, 24 * MIB);
        assert!(all_buffers(allocation));
        assert_eq!(h.manager.stub_memory_stats_for_last_manage().len(), 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn tracking_off_the_target_thread_is_rejected() {
        let h = Harness::new();
        let id = h.manager.add_tracking_group(1);

        let manager = Arc::clone(&h.manager);
        let grow = std::thread::spawn(move || manager.track_memory_allocated_change(id, 0, MIB));
        assert!(grow.join().is_err());
        assert_eq!(h.manager.bytes_allocated_current(), 0);

        let manager = Arc::clone(&h.manager);
        let add = std::thread::spawn(move || manager.add_tracking_group(2));
        assert!(add.join().is_err());

        let manager = Arc::clone(&h.manager);
        let remove = std::thread::spawn(move || manager.remove_tracking_group(id));
        assert!(remove.join().is_err());
        assert_eq!(h.manager.tracking_group_count(), 1);
    }

    #[test]
    fn passes_are_timed() {
        let h = Harness::new();
        h.manage();
        h.manage();
        let summary = h.manager.metrics_summary();
        if cfg!(feature = "metrics") {
            assert_eq!(summary.passes, 2);
        } else {
            assert_eq!(summary.passes, 0);
        }
    }
}
