//! Strata GPU memory management
//!
//! Decides how many bytes of GPU memory each command-buffer stub may keep:
//! - [`GpuMemoryManager`] runs budget passes and pushes allocations to stubs
//! - [`GpuMemoryAllocation`] is the per-stub decision
//! - tracking groups account for what each context group actually holds
//! - usage stats feed diagnostics UIs

pub mod allocation;
pub mod config;
pub mod error;
pub mod manager;
pub mod policy;
pub mod stats;
pub mod stub;
pub mod tracking_group;

pub use allocation::GpuMemoryAllocation;
pub use config::{GpuMemoryConfig, DEFAULT_DELAYED_MANAGE_MS};
pub use error::{ConfigError, GpuMemoryError};
pub use manager::{GpuMemoryManager, ManagerMetricsSummary};
pub use stats::{GpuVideoMemoryUsageStats, ManageBreakdown, ProcessMemoryStats, StubMemoryStat};
pub use stub::{
    is_more_important, CommandBufferStub, GpuMemoryManagerClient, StubId, SurfaceState,
};
pub use tracking_group::{GpuMemoryTrackingGroup, TrackingGroupId};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
