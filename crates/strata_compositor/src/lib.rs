//! Strata compositor data
//!
//! Per-frame snapshots the drawer consumes and the memory manager sizes
//! its budget against, plus the small self-rescheduling controllers that
//! live next to them:
//! - [`RenderSurface`] and [`TileDrawQuad`] value records
//! - texture cost of a render surface list
//! - [`ScrollbarAnimationController`] (linear fade)
//! - [`DebugRectHistory`] for the debug-rect overlay

pub mod debug_rects;
pub mod geometry;
pub mod memory;
pub mod quad;
pub mod scrollbar;
pub mod surface;

pub use debug_rects::{DebugRect, DebugRectHistory, DebugRectKind, DebugRectSettings};
pub use geometry::Rect;
pub use memory::{
    calculate_memory_for_render_surfaces, rgba_texture_bytes, tile_texture_bytes,
    RGBA_BYTES_PER_PIXEL,
};
pub use quad::{EdgeAntialiasing, SharedQuadState, TextureFilter, TileDrawQuad};
pub use scrollbar::{run_fade, OpacitySink, ScrollbarAnimationController};
pub use surface::{LayerId, LayerSnapshot, RenderSurface, SurfaceId};

// Re-export so callers build transforms with the same glam version
pub use glam;
