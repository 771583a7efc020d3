//! Seam between the simulation and whatever draws it.
//!
//! The simulation never talks to a GPU directly. It hands the backend the
//! scene events it queued since the last frame plus one [`View`] per surface,
//! so tests can run the full loop against [`NullBackend`] or a recorder.

use std::fmt;

use glam::Vec3;

use crate::scene::{SceneEvent, SceneGraph};

/// Which output surface a view is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    /// Full-window chase view.
    Main,
    /// Small top-down overlay.
    Minimap,
}

impl fmt::Display for SurfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceRole::Main => f.write_str("main"),
            SurfaceRole::Minimap => f.write_str("minimap"),
        }
    }
}

/// Size of a host surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, never dividing by zero.
    #[must_use]
    pub fn aspect_ratio(self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// Surfaces supplied by the host at mount time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostSurfaces {
    pub main: Option<SurfaceSize>,
    pub minimap: Option<SurfaceSize>,
}

/// Camera projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        /// Half the visible extent on each axis.
        half_extent: f32,
        near: f32,
        far: f32,
    },
}

/// A camera pose plus projection, ready to render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub position: Vec3,
    pub look_target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

/// Something that can draw a [`SceneGraph`].
pub trait RenderBackend {
    /// Mirror queued scene changes (creations, updates, releases).
    fn apply_events(&mut self, events: &[SceneEvent], scene: &SceneGraph);

    /// Draw the scene from `view` into the given surface.
    fn render(&mut self, role: SurfaceRole, scene: &SceneGraph, view: &View);

    /// A surface changed size; takes effect on the next render.
    fn resize(&mut self, role: SurfaceRole, size: SurfaceSize);

    /// Give the host surfaces back. Called once at unmount.
    fn release_surfaces(&mut self);

    /// Whether the underlying graphics context is gone.
    ///
    /// Release events are dropped rather than forwarded when this is true.
    fn is_context_lost(&self) -> bool {
        false
    }
}

/// Backend that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl RenderBackend for NullBackend {
    fn apply_events(&mut self, _events: &[SceneEvent], _scene: &SceneGraph) {}

    fn render(&mut self, _role: SurfaceRole, _scene: &SceneGraph, _view: &View) {}

    fn resize(&mut self, _role: SurfaceRole, _size: SurfaceSize) {}

    fn release_surfaces(&mut self) {}
}
