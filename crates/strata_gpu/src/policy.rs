//! Budget partitioning for one manage pass
//!
//! Pure function of the stub list and the bounds; the manager owns the
//! surrounding state. Invariant: the bytes assigned to surface stubs never
//! sum past `BudgetBounds::total_bytes`. Offscreen stubs mirror the
//! allocation of the surface stub whose context group they share, so they
//! are not charged again.

use crate::stub::compare_surface_states;
use crate::{CommandBufferStub, GpuMemoryAllocation, StubId, SurfaceState};
use std::sync::Arc;
use strata_env::PlatformLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetBounds {
    pub total_bytes: u64,
    pub max_stub_bytes: u64,
    pub min_stub_bytes: u64,
    /// Most a hidden stub may keep, and only out of leftover budget.
    pub hidden_allowance_bytes: u64,
    /// Surfaces, in importance order, that may keep a frontbuffer.
    pub max_surfaces_with_frontbuffer_soft_limit: usize,
    /// Coarse mode: visible stubs get an even share per window instead of their request.
    pub window_count: Option<u32>,
}

impl BudgetBounds {
    pub fn new(
        limits: &PlatformLimits,
        total_bytes: u64,
        frontbuffer_soft_limit: usize,
        window_count: Option<u32>,
    ) -> Self {
        let min_stub_bytes = limits.min_stub_bytes(total_bytes);
        Self {
            total_bytes,
            max_stub_bytes: limits.max_stub_bytes(total_bytes),
            min_stub_bytes,
            hidden_allowance_bytes: min_stub_bytes,
            max_surfaces_with_frontbuffer_soft_limit: frontbuffer_soft_limit,
            window_count,
        }
    }

    fn visible_request(&self, requested: u64) -> u64 {
        let wanted = match self.window_count {
            Some(windows) => self.total_bytes / u64::from(windows.max(1)),
            None => requested,
        };
        wanted.clamp(self.min_stub_bytes, self.max_stub_bytes.max(self.min_stub_bytes))
    }
}

/// One stub's outcome for the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub stub: StubId,
    pub visible: bool,
    pub allocation: GpuMemoryAllocation,
    /// Set for offscreen stubs: the surface stub whose memory they share.
    pub shares_with: Option<StubId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassPlan {
    /// In the order the input stubs were given.
    pub assignments: Vec<Assignment>,
    pub visible_bytes: u64,
    pub hidden_bytes: u64,
    pub visible_stubs: usize,
    pub hidden_stubs: usize,
    pub offscreen_stubs: usize,
}

impl PassPlan {
    /// Bytes charged against the budget (surface stubs only).
    pub fn charged_bytes(&self) -> u64 {
        self.visible_bytes + self.hidden_bytes
    }
}

pub fn plan_pass(stubs: &[Arc<dyn CommandBufferStub>], bounds: &BudgetBounds) -> PassPlan {
    let mut plan = PassPlan::default();
    if stubs.is_empty() {
        return plan;
    }

    let mut with_surface: Vec<(usize, SurfaceState)> = Vec::new();
    let mut offscreen: Vec<usize> = Vec::new();
    for (index, stub) in stubs.iter().enumerate() {
        match stub.surface_state() {
            Some(state) => with_surface.push((index, state)),
            None => offscreen.push(index),
        }
    }
    // Stable: ties keep enumeration order.
    with_surface.sort_by(|(_, a), (_, b)| compare_surface_states(a, b));

    let mut slots: Vec<Option<Assignment>> = vec![None; stubs.len()];
    let mut remaining = bounds.total_bytes;

    for (rank, &(index, state)) in with_surface.iter().enumerate() {
        let stub = &stubs[index];
        let allocation = if state.visible {
            let bytes = bounds
                .visible_request(stub.requested_memory_bytes())
                .min(remaining);
            remaining -= bytes;
            plan.visible_bytes += bytes;
            plan.visible_stubs += 1;
            GpuMemoryAllocation::new(bytes, true, true)
        } else {
            // Rank counts visible surfaces too.
            let keep_frontbuffer = rank < bounds.max_surfaces_with_frontbuffer_soft_limit;
            let bytes = if keep_frontbuffer {
                stub.requested_memory_bytes()
                    .min(bounds.hidden_allowance_bytes)
                    .min(remaining)
            } else {
                0
            };
            remaining -= bytes;
            plan.hidden_bytes += bytes;
            plan.hidden_stubs += 1;
            GpuMemoryAllocation::new(bytes, false, keep_frontbuffer)
        };
        slots[index] = Some(Assignment {
            stub: stub.stub_id(),
            visible: state.visible,
            allocation,
            shares_with: None,
        });
    }

    for &index in &offscreen {
        let stub = &stubs[index];
        // Most important surface in the same share group wins.
        let owner = with_surface
            .iter()
            .find(|(owner_index, _)| {
                stub.is_in_same_context_share_group(stubs[*owner_index].as_ref())
            })
            .copied();
        let assignment = match owner {
            Some((owner_index, state)) => Assignment {
                stub: stub.stub_id(),
                visible: state.visible,
                allocation: slots[owner_index]
                    .map(|owner| owner.allocation)
                    .unwrap_or_default(),
                shares_with: Some(stubs[owner_index].stub_id()),
            },
            None => Assignment {
                stub: stub.stub_id(),
                visible: false,
                allocation: GpuMemoryAllocation::empty(),
                shares_with: None,
            },
        };
        plan.offscreen_stubs += 1;
        slots[index] = Some(assignment);
    }

    plan.assignments = slots.into_iter().flatten().collect();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::fakes::*;
    use strata_env::{Platform, MIB};

    fn desktop(total: u64, soft_limit: usize) -> BudgetBounds {
        BudgetBounds::new(
            &PlatformLimits::for_platform(Platform::Desktop),
            total,
            soft_limit,
            None,
        )
    }

    fn as_dyn(stubs: &[&Arc<FakeSurfaceStub>]) -> Vec<Arc<dyn CommandBufferStub>> {
        stubs
            .iter()
            .map(|s| Arc::clone(*s) as Arc<dyn CommandBufferStub>)
            .collect()
    }

    #[test]
    fn empty_stub_list_assigns_nothing() {
        let plan = plan_pass(&[], &desktop(256 * MIB, 8));
        assert_eq!(plan, PassPlan::default());
    }

    #[test]
    fn visible_stubs_are_served_before_hidden() {
        let hidden = FakeSurfaceStub::with_request(1, false, 9, 100 * MIB);
        let a = FakeSurfaceStub::with_request(2, true, 1, 100 * MIB);
        let b = FakeSurfaceStub::with_request(3, true, 2, 100 * MIB);
        let plan = plan_pass(&as_dyn(&[&hidden, &a, &b]), &desktop(200 * MIB, 8));

        assert_eq!(plan.visible_bytes, 200 * MIB);
        assert_eq!(plan.hidden_bytes, 0);
        assert_eq!(plan.assignments[0].allocation.gpu_resource_size_in_bytes, 0);
        assert_eq!(plan.assignments[1].allocation.gpu_resource_size_in_bytes, 100 * MIB);
        assert_eq!(plan.assignments[2].allocation.gpu_resource_size_in_bytes, 100 * MIB);
    }

    #[test]
    fn hidden_stub_gets_allowance_from_headroom() {
        let a = FakeSurfaceStub::with_request(1, true, 1, 60 * MIB);
        let b = FakeSurfaceStub::with_request(2, true, 1, 60 * MIB);
        let hidden = FakeSurfaceStub::with_request(3, false, 1, 180 * MIB);
        let plan = plan_pass(&as_dyn(&[&a, &b, &hidden]), &desktop(200 * MIB, 8));

        assert_eq!(plan.visible_bytes, 120 * MIB);
        let hidden_alloc = plan.assignments[2].allocation;
        assert_eq!(hidden_alloc.gpu_resource_size_in_bytes, 16 * MIB);
        assert!(hidden_alloc.suggest_have_frontbuffer);
        assert!(!hidden_alloc.suggest_have_backbuffer);
    }

    #[test]
    fn last_visible_stub_is_clipped_to_remaining_budget() {
        let a = FakeSurfaceStub::with_request(1, true, 3, 90 * MIB);
        let b = FakeSurfaceStub::with_request(2, true, 2, 90 * MIB);
        let c = FakeSurfaceStub::with_request(3, true, 1, 90 * MIB);
        let plan = plan_pass(&as_dyn(&[&a, &b, &c]), &desktop(200 * MIB, 8));
        assert_eq!(plan.assignments[2].allocation.gpu_resource_size_in_bytes, 20 * MIB);
        assert_eq!(plan.charged_bytes(), 200 * MIB);
    }

    #[test]
    fn small_requests_are_raised_to_the_floor() {
        let a = FakeSurfaceStub::with_request(1, true, 1, MIB);
        let plan = plan_pass(&as_dyn(&[&a]), &desktop(256 * MIB, 8));
        assert_eq!(plan.assignments[0].allocation.gpu_resource_size_in_bytes, 16 * MIB);
    }

    #[test]
    fn window_count_mode_splits_evenly() {
        let a = FakeSurfaceStub::with_request(1, true, 1, MIB);
        let b = FakeSurfaceStub::with_request(2, true, 1, 200 * MIB);
        let mut bounds = desktop(256 * MIB, 8);
        bounds.window_count = Some(4);
        let plan = plan_pass(&as_dyn(&[&a, &b]), &bounds);
        for assignment in &plan.assignments {
            assert_eq!(assignment.allocation.gpu_resource_size_in_bytes, 64 * MIB);
        }
    }

    #[test]
    fn hidden_stubs_past_soft_limit_lose_frontbuffer() {
        let newest = FakeSurfaceStub::with_request(1, false, 3, 4 * MIB);
        let newer = FakeSurfaceStub::with_request(2, false, 2, 4 * MIB);
        let oldest = FakeSurfaceStub::with_request(3, false, 1, 4 * MIB);
        let plan = plan_pass(&as_dyn(&[&oldest, &newer, &newest]), &desktop(256 * MIB, 2));

        assert_eq!(plan.assignments[0].allocation, GpuMemoryAllocation::empty());
        assert_eq!(
            plan.assignments[1].allocation,
            GpuMemoryAllocation::new(4 * MIB, false, true)
        );
        assert_eq!(
            plan.assignments[2].allocation,
            GpuMemoryAllocation::new(4 * MIB, false, true)
        );
    }

    #[test]
    fn visible_surfaces_count_toward_the_soft_limit() {
        let visible = FakeSurfaceStub::with_request(1, true, 1, 0);
        let hidden_new = FakeSurfaceStub::with_request(2, false, 5, 0);
        let hidden_old = FakeSurfaceStub::with_request(3, false, 4, 0);
        let plan = plan_pass(
            &as_dyn(&[&visible, &hidden_new, &hidden_old]),
            &desktop(256 * MIB, 2),
        );
        assert!(plan.assignments[0].allocation.suggest_have_frontbuffer);
        assert!(plan.assignments[1].allocation.suggest_have_frontbuffer);
        assert!(!plan.assignments[2].allocation.suggest_have_frontbuffer);
    }

    #[test]
    fn offscreen_stub_mirrors_most_important_share_group_member() {
        let hidden = FakeSurfaceStub::with_request(1, false, 5, 4 * MIB);
        let visible = FakeSurfaceStub::with_request(2, true, 1, 32 * MIB);
        let offscreen = FakeOffscreenStub::sharing_with(&[&hidden, &visible]);
        let loner = FakeOffscreenStub::sharing_with(&[]);

        let mut stubs = as_dyn(&[&hidden, &visible]);
        stubs.push(offscreen.clone());
        stubs.push(loner.clone());
        let plan = plan_pass(&stubs, &desktop(256 * MIB, 8));

        assert_eq!(plan.assignments[2].allocation, plan.assignments[1].allocation);
        assert_eq!(plan.assignments[2].shares_with, Some(visible.stub_id()));
        assert!(plan.assignments[2].visible);
        assert_eq!(plan.assignments[3].allocation, GpuMemoryAllocation::empty());
        assert_eq!(plan.offscreen_stubs, 2);
        // Mirrored bytes are not charged twice.
        assert_eq!(plan.charged_bytes(), 32 * MIB + 4 * MIB);
    }

    #[test]
    fn charged_bytes_never_exceed_total() {
        let totals = [0, MIB, 17 * MIB, 64 * MIB, 200 * MIB, 256 * MIB];
        let requests = [0, 5 * MIB, 40 * MIB, 300 * MIB];
        for &total in &totals {
            let stubs: Vec<Arc<FakeSurfaceStub>> = (0..8)
                .map(|i| {
                    FakeSurfaceStub::with_request(i, i % 3 != 0, i as u64, requests[i as usize % 4])
                })
                .collect();
            let refs: Vec<&Arc<FakeSurfaceStub>> = stubs.iter().collect();
            let plan = plan_pass(&as_dyn(&refs), &desktop(total, 8));
            let sum: u64 = plan
                .assignments
                .iter()
                .map(|a| a.allocation.gpu_resource_size_in_bytes)
                .sum();
            assert!(sum <= total, "assigned {sum} of {total}");
        }
    }
}
