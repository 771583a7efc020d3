//! Top-down overview camera.

use glam::Vec3;

use crate::render::{Projection, SurfaceSize, View};

/// Configuration for the minimap camera.
#[derive(Clone, Debug)]
pub struct MinimapConfig {
    /// Camera height above the ground plane.
    pub height: f32,
    /// Half the visible square, in world units.
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
    /// Preferred surface size in pixels.
    pub surface: SurfaceSize,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            height: 100.0,
            half_extent: 50.0,
            near: 1.0,
            far: 1000.0,
            surface: SurfaceSize::new(150, 150),
        }
    }
}

/// Orthographic camera pinned above the vehicle.
#[derive(Clone, Debug)]
pub struct MinimapView {
    config: MinimapConfig,
    position: Vec3,
    surface: SurfaceSize,
}

impl Default for MinimapView {
    fn default() -> Self {
        Self::new(MinimapConfig::default())
    }
}

impl MinimapView {
    #[must_use]
    pub fn new(config: MinimapConfig) -> Self {
        Self {
            position: Vec3::new(0.0, config.height, 0.0),
            surface: config.surface,
            config,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    /// Follow the vehicle on x/z; the height never changes.
    pub fn recenter(&mut self, vehicle_position: Vec3) {
        self.position.x = vehicle_position.x;
        self.position.z = vehicle_position.z;
    }

    pub fn resize(&mut self, size: SurfaceSize) {
        self.surface = size;
    }

    /// Straight down, with -Z (the vehicle's initial forward) at the top.
    pub fn view(&self) -> View {
        View {
            position: self.position,
            look_target: Vec3::new(self.position.x, 0.0, self.position.z),
            up: Vec3::NEG_Z,
            projection: Projection::Orthographic {
                half_extent: self.config.half_extent,
                near: self.config.near,
                far: self.config.far,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recenter_keeps_height() {
        let mut minimap = MinimapView::default();
        minimap.recenter(Vec3::new(12.5, 3.0, -40.0));
        assert_eq!(minimap.position(), Vec3::new(12.5, 100.0, -40.0));

        let view = minimap.view();
        assert_eq!(view.look_target, Vec3::new(12.5, 0.0, -40.0));
        assert_eq!(
            view.projection,
            Projection::Orthographic {
                half_extent: 50.0,
                near: 1.0,
                far: 1000.0,
            }
        );
    }

    #[test]
    fn test_view_looks_straight_down() {
        let view = MinimapView::default().view();
        let direction = (view.look_target - view.position).normalize();
        assert!(direction.abs_diff_eq(Vec3::NEG_Y, 1e-6));
        assert!(direction.dot(view.up).abs() < 1e-6);
    }

    #[test]
    fn test_default_surface_and_resize() {
        let mut minimap = MinimapView::default();
        assert_eq!(minimap.surface(), SurfaceSize::new(150, 150));
        minimap.resize(SurfaceSize::new(200, 120));
        assert_eq!(minimap.surface(), SurfaceSize::new(200, 120));
    }
}
