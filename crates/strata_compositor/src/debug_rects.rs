//! Screen-space rects collected each frame for the debug overlay

use crate::{Rect, RenderSurface};
use serde::{Deserialize, Serialize};

/// Which rect families the overlay shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugRectSettings {
    pub show_paint_rects: bool,
    pub show_property_changed_rects: bool,
    pub show_surface_damage_rects: bool,
    pub show_screen_space_rects: bool,
    pub show_replica_screen_space_rects: bool,
    pub show_occluding_rects: bool,
}

impl DebugRectSettings {
    pub fn all() -> Self {
        Self {
            show_paint_rects: true,
            show_property_changed_rects: true,
            show_surface_damage_rects: true,
            show_screen_space_rects: true,
            show_replica_screen_space_rects: true,
            show_occluding_rects: true,
        }
    }

    pub fn any(&self) -> bool {
        self.show_paint_rects
            || self.show_property_changed_rects
            || self.show_surface_damage_rects
            || self.show_screen_space_rects
            || self.show_replica_screen_space_rects
            || self.show_occluding_rects
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugRectKind {
    Paint,
    PropertyChanged,
    SurfaceDamage,
    ReplicaScreenSpace,
    ScreenSpace,
    Occluding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugRect {
    pub kind: DebugRectKind,
    pub rect: Rect,
}

impl DebugRect {
    pub fn new(kind: DebugRectKind, rect: Rect) -> Self {
        Self { kind, rect }
    }
}

/// Debug rects of the most recent frame only.
#[derive(Debug, Default)]
pub struct DebugRectHistory {
    rects: Vec<DebugRect>,
}

impl DebugRectHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored rects with the ones `settings` asks for from this frame.
    pub fn save_debug_rects_for_current_frame(
        &mut self,
        surfaces: &[RenderSurface],
        occluding_screen_space_rects: &[Rect],
        settings: &DebugRectSettings,
    ) {
        self.rects.clear();

        if settings.show_paint_rects {
            self.save_paint_rects(surfaces);
        }
        if settings.show_property_changed_rects {
            self.save_property_changed_rects(surfaces);
        }
        if settings.show_surface_damage_rects {
            self.save_surface_damage_rects(surfaces);
        }
        if settings.show_screen_space_rects {
            self.save_screen_space_rects(surfaces, settings.show_replica_screen_space_rects);
        }
        if settings.show_occluding_rects {
            self.rects.extend(
                occluding_screen_space_rects
                    .iter()
                    .map(|rect| DebugRect::new(DebugRectKind::Occluding, *rect)),
            );
        }

        tracing::trace!(rects = self.rects.len(), "debug rects saved");
    }

    pub fn debug_rects(&self) -> &[DebugRect] {
        &self.rects
    }

    pub fn count(&self, kind: DebugRectKind) -> usize {
        self.rects.iter().filter(|rect| rect.kind == kind).count()
    }

    fn save_paint_rects(&mut self, surfaces: &[RenderSurface]) {
        for layer in surfaces.iter().flat_map(|surface| &surface.layers) {
            let painted = layer.update_rect.intersect(&layer.bounds);
            if !painted.is_empty() {
                self.rects.push(DebugRect::new(
                    DebugRectKind::Paint,
                    painted.map_enclosing(&layer.screen_space_transform),
                ));
            }
        }
    }

    fn save_property_changed_rects(&mut self, surfaces: &[RenderSurface]) {
        for layer in surfaces.iter().flat_map(|surface| &surface.layers) {
            if layer.property_changed && !layer.bounds.is_empty() {
                self.rects.push(DebugRect::new(
                    DebugRectKind::PropertyChanged,
                    layer.screen_space_rect(),
                ));
            }
        }
    }

    fn save_surface_damage_rects(&mut self, surfaces: &[RenderSurface]) {
        for surface in surfaces {
            if !surface.damage_rect.is_empty() {
                self.rects.push(DebugRect::new(
                    DebugRectKind::SurfaceDamage,
                    surface.damage_rect.map_enclosing(&surface.screen_space_transform),
                ));
            }
        }
    }

    fn save_screen_space_rects(&mut self, surfaces: &[RenderSurface], show_replicas: bool) {
        for surface in surfaces {
            self.rects.push(DebugRect::new(
                DebugRectKind::ScreenSpace,
                surface.screen_space_rect(),
            ));
            if !show_replicas {
                continue;
            }
            if let Some(replica) = surface.replica_screen_space_rect() {
                self.rects
                    .push(DebugRect::new(DebugRectKind::ReplicaScreenSpace, replica));
            }
        }
    }
}
