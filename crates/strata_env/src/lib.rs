//! Strata environment probing
//!
//! Detects which platform family we are running on and exposes the
//! per-platform GPU memory limits the budget allocator is tuned against.

pub mod limits;
pub mod platform;

pub use limits::{PlatformLimits, StubCeiling};
pub use platform::Platform;

/// Convenience: bytes in one mebibyte.
pub const MIB: u64 = 1024 * 1024;
