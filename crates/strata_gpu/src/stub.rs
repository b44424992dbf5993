//! Command-buffer stubs and the client that enumerates them

use crate::GpuMemoryAllocation;
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

/// Stable identity of a stub, issued once when the stub registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StubId(u64);

impl StubId {
    /// Issue a fresh, process-unique id.
    pub fn allocate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stub#{}", self.0)
    }
}

/// What the manager knows about a stub that renders to an on-screen surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceState {
    pub surface_id: i32,
    pub visible: bool,
    /// Monotonic time of the last user interaction with the surface.
    pub last_used_time: Duration,
}

impl SurfaceState {
    pub fn new(surface_id: i32, visible: bool, last_used_time: Duration) -> Self {
        Self {
            surface_id,
            visible,
            last_used_time,
        }
    }
}

/// A render-target owner (one per GPU command-buffer connection).
pub trait CommandBufferStub: Send + Sync {
    fn stub_id(&self) -> StubId;

    /// `None` for offscreen stubs that have no surface of their own.
    fn surface_state(&self) -> Option<SurfaceState>;

    /// Offscreen stubs borrow the allocation of a surface stub they share a
    /// context group with.
    fn is_in_same_context_share_group(&self, other: &dyn CommandBufferStub) -> bool;

    /// Bytes the stub would like to keep resident (texture cost of its surfaces).
    fn requested_memory_bytes(&self) -> u64;

    fn set_memory_allocation(&self, allocation: &GpuMemoryAllocation);
}

/// Collaborator that owns the stubs.
pub trait GpuMemoryManagerClient: Send + Sync {
    /// Append every live stub. An empty result means nothing to allocate.
    fn append_all_command_buffer_stubs(&self, stubs: &mut Vec<Arc<dyn CommandBufferStub>>);

    /// Total GPU memory as reported by the driver, when it can tell.
    fn total_gpu_memory_bytes(&self) -> Option<u64> {
        None
    }
}

/// Order surfaces by importance: visible before hidden, then most recently
/// used first. Equal keys compare equal so a stable sort keeps enumeration
/// order.
pub fn compare_surface_states(lhs: &SurfaceState, rhs: &SurfaceState) -> Ordering {
    rhs.visible
        .cmp(&lhs.visible)
        .then_with(|| rhs.last_used_time.cmp(&lhs.last_used_time))
}

/// True when `lhs` should be served before `rhs`. Stubs without a surface are
/// never more important than anything.
pub fn is_more_important(lhs: &dyn CommandBufferStub, rhs: &dyn CommandBufferStub) -> bool {
    match (lhs.surface_state(), rhs.surface_state()) {
        (Some(l), Some(r)) => compare_surface_states(&l, &r) == Ordering::Less,
        (Some(_), None) => true,
        _ => false,
    }
}
