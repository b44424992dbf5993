//! Tracking groups: per-context-group memory accounting
//!
//! The manager keeps the byte counts keyed by [`TrackingGroupId`];
//! [`GpuMemoryTrackingGroup`] is the owner-side handle that reports changes
//! and deregisters itself when dropped.

use crate::GpuMemoryManager;
use std::fmt;
use std::sync::Weak;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingGroupId(pub(crate) u64);

impl TrackingGroupId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackingGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Owned by a context group for as long as it lives.
pub struct GpuMemoryTrackingGroup {
    id: TrackingGroupId,
    pid: u32,
    manager: Weak<GpuMemoryManager>,
}

impl GpuMemoryTrackingGroup {
    pub(crate) fn new(id: TrackingGroupId, pid: u32, manager: Weak<GpuMemoryManager>) -> Self {
        Self { id, pid, manager }
    }

    pub fn id(&self) -> TrackingGroupId {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Report that this group's resources went from `old_size` to `new_size` bytes.
    pub fn track_memory_allocated_change(&self, old_size: u64, new_size: u64) {
        if let Some(manager) = self.manager.upgrade() {
            manager.track_memory_allocated_change(self.id, old_size, new_size);
        }
    }

    /// Bytes currently attributed to this group; 0 once the manager is gone.
    pub fn size(&self) -> u64 {
        self.manager
            .upgrade()
            .and_then(|manager| manager.tracking_group_size(self.id))
            .unwrap_or(0)
    }
}

impl Drop for GpuMemoryTrackingGroup {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.remove_tracking_group(self.id);
        }
    }
}
