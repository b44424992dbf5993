//! Per-stub allocation decision

use serde::Serialize;

/// Byte budget plus buffer policy handed to one stub for one pass.
///
/// A stub that receives less than it uses must shrink (drop tiles, discard
/// its backbuffer); the allocation is a negotiation, never a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct GpuMemoryAllocation {
    pub gpu_resource_size_in_bytes: u64,
    /// Keep the backbuffer (only for surfaces being composited).
    pub suggest_have_backbuffer: bool,
    /// Keep the last presented frame around.
    pub suggest_have_frontbuffer: bool,
}

impl GpuMemoryAllocation {
    pub const fn new(
        gpu_resource_size_in_bytes: u64,
        suggest_have_backbuffer: bool,
        suggest_have_frontbuffer: bool,
    ) -> Self {
        Self {
            gpu_resource_size_in_bytes,
            suggest_have_backbuffer,
            suggest_have_frontbuffer,
        }
    }

    /// Nothing retained at all.
    pub const fn empty() -> Self {
        Self::new(0, false, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_covers_every_field() {
        let base = GpuMemoryAllocation::new(12_345_678, true, false);
        assert_eq!(base, GpuMemoryAllocation::new(12_345_678, true, false));
        assert_ne!(base, GpuMemoryAllocation::new(12_345_679, true, false));
        assert_ne!(base, GpuMemoryAllocation::new(12_345_678, false, false));
        assert_ne!(base, GpuMemoryAllocation::new(12_345_678, true, true));
        assert_eq!(GpuMemoryAllocation::default(), GpuMemoryAllocation::empty());
    }
}
