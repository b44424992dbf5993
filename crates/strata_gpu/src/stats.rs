//! Per-pass snapshots and diagnostics aggregates

use crate::GpuMemoryAllocation;
use serde::Serialize;
use std::collections::BTreeMap;

/// What one stub was given in the most recent manage pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StubMemoryStat {
    pub visible: bool,
    pub allocation: GpuMemoryAllocation,
}

/// Memory held by one process across its tracking groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessMemoryStats {
    pub video_memory: u64,
    pub tracking_groups: usize,
}

/// How the last pass split the budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManageBreakdown {
    pub visible_stubs: usize,
    pub hidden_stubs: usize,
    pub offscreen_stubs: usize,
    pub visible_bytes: u64,
    pub hidden_bytes: u64,
}

/// Read-only summary for task-manager style UIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GpuVideoMemoryUsageStats {
    /// Keyed by process id.
    pub process_map: BTreeMap<u32, ProcessMemoryStats>,
    pub bytes_allocated: u64,
    pub bytes_allocated_historical_max: u64,
    pub bytes_available: u64,
    pub last_manage: ManageBreakdown,
}

impl GpuVideoMemoryUsageStats {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
