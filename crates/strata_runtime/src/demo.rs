//! Demo stubs backed by compositor frames
//!
//! Each tab owns a committed frame; what it asks the memory manager for is
//! the texture cost of that frame's render surfaces and tiles.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_compositor::glam::{IVec2, Mat4, Vec3};
use strata_compositor::{
    calculate_memory_for_render_surfaces, tile_texture_bytes, EdgeAntialiasing, LayerId,
    LayerSnapshot, Rect, RenderSurface, SharedQuadState, SurfaceId, TextureFilter, TileDrawQuad,
};
use strata_gpu::{
    CommandBufferStub, GpuMemoryAllocation, GpuMemoryManagerClient, StubId, SurfaceState,
};

const TILE_SIZE: i32 = 256;

pub struct DemoTab {
    id: StubId,
    name: &'static str,
    surface: Mutex<SurfaceState>,
    frame: Vec<RenderSurface>,
    tiles: Vec<TileDrawQuad>,
    device_viewport: IVec2,
    allocation: Mutex<GpuMemoryAllocation>,
}

impl DemoTab {
    pub fn new(name: &'static str, surface_id: i32, visible: bool, last_used: Duration) -> Arc<Self> {
        let device_viewport = IVec2::new(1280, 800);
        let frame = demo_frame(surface_id as u32, device_viewport);
        let tiles = tile_viewport(device_viewport);
        Arc::new(Self {
            id: StubId::allocate(),
            name,
            surface: Mutex::new(SurfaceState::new(surface_id, visible, last_used)),
            frame,
            tiles,
            device_viewport,
            allocation: Mutex::new(GpuMemoryAllocation::default()),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn frame(&self) -> &[RenderSurface] {
        &self.frame
    }

    pub fn allocation(&self) -> GpuMemoryAllocation {
        *self.allocation.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CommandBufferStub for DemoTab {
    fn stub_id(&self) -> StubId {
        self.id
    }

    fn surface_state(&self) -> Option<SurfaceState> {
        Some(*self.surface.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn is_in_same_context_share_group(&self, _other: &dyn CommandBufferStub) -> bool {
        false
    }

    fn requested_memory_bytes(&self) -> u64 {
        calculate_memory_for_render_surfaces(&self.frame, self.device_viewport)
            + tile_texture_bytes(&self.tiles)
    }

    fn set_memory_allocation(&self, allocation: &GpuMemoryAllocation) {
        *self.allocation.lock().unwrap_or_else(|e| e.into_inner()) = *allocation;
    }
}

/// An offscreen context (canvas, WebGL) living in a tab's share group.
pub struct DemoOffscreenContext {
    id: StubId,
    owner: StubId,
    allocation: Mutex<GpuMemoryAllocation>,
}

impl DemoOffscreenContext {
    pub fn new(owner: &DemoTab) -> Arc<Self> {
        Arc::new(Self {
            id: StubId::allocate(),
            owner: owner.stub_id(),
            allocation: Mutex::new(GpuMemoryAllocation::default()),
        })
    }

    pub fn allocation(&self) -> GpuMemoryAllocation {
        *self.allocation.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CommandBufferStub for DemoOffscreenContext {
    fn stub_id(&self) -> StubId {
        self.id
    }

    fn surface_state(&self) -> Option<SurfaceState> {
        None
    }

    fn is_in_same_context_share_group(&self, other: &dyn CommandBufferStub) -> bool {
        other.stub_id() == self.owner
    }

    fn requested_memory_bytes(&self) -> u64 {
        0
    }

    fn set_memory_allocation(&self, allocation: &GpuMemoryAllocation) {
        *self.allocation.lock().unwrap_or_else(|e| e.into_inner()) = *allocation;
    }
}

/// A foreground tab, a background tab and a canvas in the foreground tab.
pub struct DemoClient {
    pub foreground: Arc<DemoTab>,
    pub background: Arc<DemoTab>,
    pub canvas: Arc<DemoOffscreenContext>,
}

impl DemoClient {
    pub fn new() -> Self {
        let foreground = DemoTab::new("foreground", 1, true, Duration::from_secs(20));
        let background = DemoTab::new("background", 2, false, Duration::from_secs(10));
        let canvas = DemoOffscreenContext::new(&foreground);
        Self {
            foreground,
            background,
            canvas,
        }
    }

    pub fn tabs(&self) -> [&Arc<DemoTab>; 2] {
        [&self.foreground, &self.background]
    }
}

impl Default for DemoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuMemoryManagerClient for DemoClient {
    fn append_all_command_buffer_stubs(&self, stubs: &mut Vec<Arc<dyn CommandBufferStub>>) {
        stubs.push(self.foreground.clone());
        stubs.push(self.background.clone());
        stubs.push(self.canvas.clone());
    }
}

/// Root surface with a scrolled content layer and one filtered, reflected child.
fn demo_frame(seed: u32, viewport: IVec2) -> Vec<RenderSurface> {
    let scroll = Mat4::from_translation(Vec3::new(0.0, -120.0, 0.0));
    let mut content = LayerSnapshot::new(LayerId(seed * 10), Rect::from_size(viewport.x, 4 * viewport.y));
    content.screen_space_transform = scroll;
    content.update_rect = Rect::new(0, 120, viewport.x, 200);

    let mut root = RenderSurface::new(SurfaceId(seed * 10), Rect::from_size(viewport.x, viewport.y))
        .with_layer(content);
    root.damage_rect = Rect::new(0, 0, viewport.x, 200);

    let offset = Mat4::from_translation(Vec3::new(40.0, 300.0, 0.0));
    let reflection = Mat4::from_translation(Vec3::new(40.0, 900.0, 0.0))
        * Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
    let mut panel = RenderSurface::new(SurfaceId(seed * 10 + 1), Rect::from_size(600, 300))
        .with_transforms(offset, offset)
        .with_replica(reflection, reflection);
    panel.has_background_filters = true;
    panel.draw_opacity = 0.9;

    vec![root, panel]
}

fn tile_viewport(viewport: IVec2) -> Vec<TileDrawQuad> {
    let shared = SharedQuadState::new(Rect::from_size(viewport.x, viewport.y), 1.0, true);
    let mut tiles = Vec::new();
    let mut resource_id = 1;
    for y in (0..viewport.y).step_by(TILE_SIZE as usize) {
        for x in (0..viewport.x).step_by(TILE_SIZE as usize) {
            let quad_rect = Rect::new(x, y, TILE_SIZE, TILE_SIZE);
            tiles.push(TileDrawQuad::new(
                Arc::clone(&shared),
                quad_rect,
                quad_rect,
                resource_id,
                IVec2::ZERO,
                IVec2::splat(TILE_SIZE),
                TextureFilter::Linear,
                false,
                EdgeAntialiasing::NONE,
            ));
            resource_id += 1;
        }
    }
    tiles
}
