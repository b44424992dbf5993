//! Render surfaces: the per-commit records a drawer renders into textures

use crate::memory::rgba_texture_bytes;
use crate::Rect;
use glam::Mat4;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

/// What the overlay and the drawer need from one layer drawn into a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSnapshot {
    pub id: LayerId,
    /// Layer bounds in its own content space.
    pub bounds: Rect,
    pub screen_space_transform: Mat4,
    /// Region repainted this frame, in content space.
    pub update_rect: Rect,
    pub property_changed: bool,
}

impl LayerSnapshot {
    pub fn new(id: LayerId, bounds: Rect) -> Self {
        Self {
            id,
            bounds,
            screen_space_transform: Mat4::IDENTITY,
            update_rect: Rect::default(),
            property_changed: false,
        }
    }

    pub fn screen_space_rect(&self) -> Rect {
        self.bounds.map_enclosing(&self.screen_space_transform)
    }
}

/// One render surface as committed for a frame. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSurface {
    pub id: SurfaceId,
    pub content_rect: Rect,
    /// Surface space to its render target's space.
    pub draw_transform: Mat4,
    pub screen_space_transform: Mat4,
    pub replica_draw_transform: Option<Mat4>,
    pub replica_screen_space_transform: Option<Mat4>,
    pub draw_opacity: f32,
    /// Empty means the surface clips nothing.
    pub clip_rect: Rect,
    pub layers: Vec<LayerSnapshot>,
    pub has_background_filters: bool,
    /// Damage accumulated for this frame, in surface space.
    pub damage_rect: Rect,
}

impl RenderSurface {
    pub fn new(id: SurfaceId, content_rect: Rect) -> Self {
        Self {
            id,
            content_rect,
            draw_transform: Mat4::IDENTITY,
            screen_space_transform: Mat4::IDENTITY,
            replica_draw_transform: None,
            replica_screen_space_transform: None,
            draw_opacity: 1.0,
            clip_rect: Rect::default(),
            layers: Vec::new(),
            has_background_filters: false,
            damage_rect: Rect::default(),
        }
    }

    pub fn with_transforms(mut self, draw: Mat4, screen_space: Mat4) -> Self {
        self.draw_transform = draw;
        self.screen_space_transform = screen_space;
        self
    }

    pub fn with_replica(mut self, draw: Mat4, screen_space: Mat4) -> Self {
        self.replica_draw_transform = Some(draw);
        self.replica_screen_space_transform = Some(screen_space);
        self
    }

    pub fn with_layer(mut self, layer: LayerSnapshot) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn has_replica(&self) -> bool {
        self.replica_draw_transform.is_some()
    }

    pub fn is_clipped(&self) -> bool {
        !self.clip_rect.is_empty()
    }

    /// Area this surface (and its replica, if any) covers in its target.
    pub fn drawable_content_rect(&self) -> Rect {
        let drawable = self.content_rect.map_enclosing(&self.draw_transform);
        match &self.replica_draw_transform {
            Some(replica) => drawable.union(&self.content_rect.map_enclosing(replica)),
            None => drawable,
        }
    }

    pub fn screen_space_rect(&self) -> Rect {
        self.content_rect.map_enclosing(&self.screen_space_transform)
    }

    pub fn replica_screen_space_rect(&self) -> Option<Rect> {
        self.replica_screen_space_transform
            .as_ref()
            .map(|transform| self.content_rect.map_enclosing(transform))
    }

    /// Bytes of the RGBA texture backing the surface contents.
    pub fn texture_bytes(&self) -> u64 {
        rgba_texture_bytes(self.content_rect.width, self.content_rect.height)
    }
}
