//! Texture memory cost of what the compositor keeps resident

use crate::{RenderSurface, TileDrawQuad};
use glam::IVec2;

pub const RGBA_BYTES_PER_PIXEL: u64 = 4;

/// Bytes of an RGBA texture; non-positive dimensions cost nothing.
pub fn rgba_texture_bytes(width: i32, height: i32) -> u64 {
    if width <= 0 || height <= 0 {
        return 0;
    }
    width as u64 * height as u64 * RGBA_BYTES_PER_PIXEL
}

/// Bytes needed to hold every non-root render surface of a frame.
///
/// `surfaces` is the render surface list in draw order, root first; the
/// root draws straight into the framebuffer and has no texture. Background
/// filters need the largest filtered surface once more plus one readback of
/// the whole device viewport.
pub fn calculate_memory_for_render_surfaces(
    surfaces: &[RenderSurface],
    device_viewport: IVec2,
) -> u64 {
    let mut readback_bytes = 0;
    let mut max_background_texture_bytes = 0;
    let mut contents_texture_bytes = 0;

    for surface in surfaces.iter().skip(1) {
        let bytes = surface.texture_bytes();
        contents_texture_bytes += bytes;

        if !surface.has_background_filters {
            continue;
        }
        max_background_texture_bytes = max_background_texture_bytes.max(bytes);
        if readback_bytes == 0 {
            readback_bytes = rgba_texture_bytes(device_viewport.x, device_viewport.y);
        }
    }

    readback_bytes + max_background_texture_bytes + contents_texture_bytes
}

/// Bytes of the textures behind a set of tiles.
pub fn tile_texture_bytes(quads: &[TileDrawQuad]) -> u64 {
    quads.iter().map(TileDrawQuad::texture_bytes).sum()
}
