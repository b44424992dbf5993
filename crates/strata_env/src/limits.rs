//! Per-platform GPU memory limits
//!
//! One row per [`Platform`]. The allocator reads a row once at construction
//! and never branches on the platform again.

use crate::{Platform, MIB};

/// Upper bound for a single stub's allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubCeiling {
    /// `total / divisor`, additionally capped at `cap` bytes when present.
    Fraction { divisor: u64, cap: Option<u64> },
    /// Fixed byte ceiling regardless of the total budget.
    Absolute(u64),
}

impl StubCeiling {
    /// Resolve the ceiling against a total budget.
    pub fn resolve(&self, total_bytes: u64) -> u64 {
        match *self {
            StubCeiling::Fraction { divisor, cap } => {
                let share = total_bytes / divisor.max(1);
                cap.map_or(share, |cap| share.min(cap))
            }
            StubCeiling::Absolute(bytes) => bytes,
        }
    }
}

/// Memory constants for one platform family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    pub platform: Platform,
    /// Budget used when neither the driver nor the embedder reports one.
    pub default_total_bytes: u64,
    pub stub_ceiling: StubCeiling,
    /// Smallest non-zero allocation handed to a visible stub.
    pub stub_floor_bytes: u64,
    /// Hidden surfaces allowed to keep their frontbuffer.
    pub max_surfaces_with_frontbuffer_soft_limit: usize,
}

const LIMITS_TABLE: [PlatformLimits; 3] = [
    PlatformLimits {
        platform: Platform::Desktop,
        default_total_bytes: 256 * MIB,
        stub_ceiling: StubCeiling::Fraction { divisor: 2, cap: None },
        stub_floor_bytes: 16 * MIB,
        max_surfaces_with_frontbuffer_soft_limit: 8,
    },
    PlatformLimits {
        platform: Platform::Android,
        default_total_bytes: 64 * MIB,
        stub_ceiling: StubCeiling::Fraction { divisor: 2, cap: Some(32 * MIB) },
        stub_floor_bytes: 8 * MIB,
        max_surfaces_with_frontbuffer_soft_limit: 2,
    },
    PlatformLimits {
        platform: Platform::ChromeOs,
        default_total_bytes: 128 * MIB,
        stub_ceiling: StubCeiling::Absolute(64 * MIB),
        stub_floor_bytes: 8 * MIB,
        max_surfaces_with_frontbuffer_soft_limit: 4,
    },
];

impl PlatformLimits {
    pub fn for_platform(platform: Platform) -> Self {
        LIMITS_TABLE
            .iter()
            .copied()
            .find(|row| row.platform == platform)
            .unwrap_or(LIMITS_TABLE[0])
    }

    pub fn detect() -> Self {
        Self::for_platform(Platform::detect())
    }

    /// Largest allocation one stub may receive out of `total_bytes`.
    pub fn max_stub_bytes(&self, total_bytes: u64) -> u64 {
        self.stub_ceiling.resolve(total_bytes)
    }

    /// Smallest allocation a visible stub receives, never above the ceiling.
    pub fn min_stub_bytes(&self, total_bytes: u64) -> u64 {
        self.stub_floor_bytes.min(self.max_stub_bytes(total_bytes))
    }
}
