//! Third-person chase camera.
//!
//! Trails the vehicle at a fixed offset rotated by its heading, easing toward
//! that spot instead of snapping to it.

use glam::{Quat, Vec3};

use crate::{
    render::{Projection, SurfaceSize, View},
    vehicle::{VehicleState, reference_ticks},
};

/// Configuration for the chase camera.
#[derive(Clone, Debug)]
pub struct ChaseCameraConfig {
    /// Camera offset in vehicle-local space (x=right, y=up, z=behind).
    pub camera_offset: Vec3,
    /// Fraction of the remaining distance covered per reference tick.
    pub smoothing: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ChaseCameraConfig {
    fn default() -> Self {
        Self {
            camera_offset: Vec3::new(0.0, 5.0, 10.0),
            smoothing: 0.1,
            fov_y: 75f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Camera pose for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    /// Always the vehicle position.
    pub look_target: Vec3,
}

/// Smoothed follow camera.
#[derive(Clone, Debug)]
pub struct ChaseCamera {
    config: ChaseCameraConfig,
    state: CameraState,
    aspect: f32,
}

impl Default for ChaseCamera {
    fn default() -> Self {
        Self::new(ChaseCameraConfig::default())
    }
}

impl ChaseCamera {
    /// Start at the rest offset behind a vehicle parked at the origin.
    #[must_use]
    pub fn new(config: ChaseCameraConfig) -> Self {
        let state = CameraState {
            position: config.camera_offset,
            look_target: Vec3::ZERO,
        };
        Self {
            config,
            state,
            aspect: 16.0 / 9.0,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Where the camera would sit with no smoothing.
    pub fn desired_position(&self, vehicle: &VehicleState) -> Vec3 {
        vehicle.position + Quat::from_rotation_y(vehicle.heading) * self.config.camera_offset
    }

    /// Ease toward the desired position and aim at the vehicle.
    ///
    /// The per-tick factor is converted to `1 - (1 - s)^k` so that the
    /// approach curve does not depend on the frame rate.
    pub fn update(&mut self, vehicle: &VehicleState, dt: f32) -> CameraState {
        let k = reference_ticks(dt);
        let alpha = 1.0 - (1.0 - self.config.smoothing).powf(k);
        let desired = self.desired_position(vehicle);
        self.state = CameraState {
            position: self.state.position.lerp(desired, alpha),
            look_target: vehicle.position,
        };
        self.state
    }

    /// Recompute the projection for a new surface size.
    pub fn resize(&mut self, size: SurfaceSize) {
        self.aspect = size.aspect_ratio();
    }

    pub fn view(&self) -> View {
        View {
            position: self.state.position,
            look_target: self.state.look_target,
            up: Vec3::Y,
            projection: Projection::Perspective {
                fov_y: self.config.fov_y,
                aspect: self.aspect,
                near: self.config.near,
                far: self.config.far,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_offset_trails_heading() {
        let camera = ChaseCamera::default();
        let mut vehicle = VehicleState::default();
        // Facing -Z: camera behind at +Z.
        assert!(camera.desired_position(&vehicle).abs_diff_eq(Vec3::new(0.0, 5.0, 10.0), 1e-5));

        // Facing +Z after a half turn: camera behind at -Z.
        vehicle.heading = PI;
        assert!(camera.desired_position(&vehicle).abs_diff_eq(Vec3::new(0.0, 5.0, -10.0), 1e-4));

        // Facing -X after a left quarter turn: camera behind at +X.
        vehicle.heading = FRAC_PI_2;
        vehicle.position = Vec3::new(3.0, 0.0, 4.0);
        assert!(camera.desired_position(&vehicle).abs_diff_eq(Vec3::new(13.0, 5.0, 4.0), 1e-4));
    }

    #[test]
    fn test_moves_ten_percent_per_reference_tick() {
        let mut camera = ChaseCamera::default();
        let vehicle = VehicleState {
            position: Vec3::new(0.0, 0.0, -20.0),
            ..Default::default()
        };
        let start = camera.state().position;
        let desired = camera.desired_position(&vehicle);
        let state = camera.update(&vehicle, DT);
        let expected = start + (desired - start) * 0.1;
        assert!(state.position.abs_diff_eq(expected, 1e-4));
        assert_eq!(state.look_target, vehicle.position);
    }

    #[test]
    fn test_smoothing_is_frame_rate_independent() {
        let vehicle = VehicleState {
            position: Vec3::new(5.0, 0.0, -30.0),
            ..Default::default()
        };
        let mut slow = ChaseCamera::default();
        let mut fast = ChaseCamera::default();
        for _ in 0..30 {
            slow.update(&vehicle, 1.0 / 60.0);
        }
        for _ in 0..60 {
            fast.update(&vehicle, 1.0 / 120.0);
        }
        assert!(slow.state().position.abs_diff_eq(fast.state().position, 1e-2));
    }

    #[test]
    fn test_converges_on_stationary_vehicle() {
        let mut camera = ChaseCamera::default();
        let vehicle = VehicleState {
            position: Vec3::new(-8.0, 0.0, 12.0),
            heading: 1.0,
            ..Default::default()
        };
        for _ in 0..600 {
            camera.update(&vehicle, DT);
        }
        assert!(
            camera
                .state()
                .position
                .abs_diff_eq(camera.desired_position(&vehicle), 1e-3)
        );
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut camera = ChaseCamera::default();
        camera.resize(SurfaceSize::new(800, 400));
        let Projection::Perspective { aspect, .. } = camera.view().projection else {
            panic!("chase camera should be perspective");
        };
        assert!((aspect - 2.0).abs() < f32::EPSILON);

        // A collapsed surface must not produce an infinite aspect ratio.
        camera.resize(SurfaceSize::new(800, 0));
        let Projection::Perspective { aspect, .. } = camera.view().projection else {
            panic!("chase camera should be perspective");
        };
        assert!(aspect.is_finite());
    }
}
