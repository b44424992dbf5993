//! Tile draw quads

use crate::memory::rgba_texture_bytes;
use crate::Rect;
use glam::{IVec2, Mat4};
use std::sync::Arc;

/// State shared by every quad a layer emits in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedQuadState {
    pub quad_transform: Mat4,
    pub visible_content_rect: Rect,
    pub clipped_rect_in_target: Rect,
    pub opacity: f32,
    pub opaque: bool,
}

impl SharedQuadState {
    pub fn new(visible_content_rect: Rect, opacity: f32, opaque: bool) -> Arc<Self> {
        Arc::new(Self {
            quad_transform: Mat4::IDENTITY,
            visible_content_rect,
            clipped_rect_in_target: visible_content_rect,
            opacity,
            opaque,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeAntialiasing {
    pub left: bool,
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
}

impl EdgeAntialiasing {
    pub const NONE: Self = Self {
        left: false,
        top: false,
        right: false,
        bottom: false,
    };

    pub fn any(&self) -> bool {
        self.left || self.top || self.right || self.bottom
    }
}

/// One tile of a tiled layer, sampled from a resource texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDrawQuad {
    shared_quad_state: Arc<SharedQuadState>,
    pub quad_rect: Rect,
    pub opaque_rect: Rect,
    pub resource_id: u32,
    pub texture_offset: IVec2,
    pub texture_size: IVec2,
    pub texture_filter: TextureFilter,
    pub swizzle_contents: bool,
    pub edge_aa: EdgeAntialiasing,
}

impl TileDrawQuad {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shared_quad_state: Arc<SharedQuadState>,
        quad_rect: Rect,
        opaque_rect: Rect,
        resource_id: u32,
        texture_offset: IVec2,
        texture_size: IVec2,
        texture_filter: TextureFilter,
        swizzle_contents: bool,
        edge_aa: EdgeAntialiasing,
    ) -> Self {
        Self {
            shared_quad_state,
            quad_rect,
            opaque_rect,
            resource_id,
            texture_offset,
            texture_size,
            texture_filter,
            swizzle_contents,
            edge_aa,
        }
    }

    pub fn shared_quad_state(&self) -> &Arc<SharedQuadState> {
        &self.shared_quad_state
    }

    pub fn is_antialiased(&self) -> bool {
        self.edge_aa.any()
    }

    /// True unless the tile is fully opaque and drawn at full opacity.
    pub fn needs_blending(&self) -> bool {
        self.shared_quad_state.opacity < 1.0 || !self.opaque_rect.contains(&self.quad_rect)
    }

    pub fn texture_bytes(&self) -> u64 {
        rgba_texture_bytes(self.texture_size.x, self.texture_size.y)
    }
}
