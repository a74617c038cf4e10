use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

const EPS: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov_degrees,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self::new(config.fov_degrees, aspect, config.near, config.far);
        camera.position = config.position;
        camera.target = Vec3::ZERO;
        camera
    }

    /// Rebuilds the projection after `fov_degrees`, `aspect`, `near` or `far` changed.
    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// World-to-view transform. Stays finite when the camera sits on its
    /// target or looks straight up or down.
    pub fn view_matrix(&self) -> Mat4 {
        let forward = self.forward();
        let up = if forward.cross(Vec3::Y).length_squared() < EPS {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_to_rh(self.position, forward, up)
    }

    pub fn forward(&self) -> Vec3 {
        let forward = (self.target - self.position).normalize_or_zero();
        if forward == Vec3::ZERO {
            Vec3::NEG_Z
        } else {
            forward
        }
    }
}

/// Pending orbit motion, in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SphericalDelta {
    theta: f32,
    phi: f32,
}

/// Orbits the camera around `target` from pointer drags and wheel input,
/// easing motion out over several updates when damping is on.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    delta: SphericalDelta,
    scale: f32,
    updates: u64,
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            delta: SphericalDelta::default(),
            scale: 1.0,
            updates: 0,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor.clamp(0.0, 1.0),
            ..Self::new(Vec3::ZERO)
        }
    }

    /// Pointer drag of `dx`/`dy` pixels on a viewport `viewport_height` pixels tall.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        self.delta.theta -= TAU * dx / height * self.rotate_speed;
        self.delta.phi -= TAU * dy / height * self.rotate_speed;
    }

    /// Multiplies the orbit radius on the next update; `factor > 1` moves out.
    pub fn dolly(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.scale *= factor;
        }
    }

    /// Orbit motion still waiting to be applied.
    pub fn pending_motion(&self) -> f32 {
        self.delta.theta.abs() + self.delta.phi.abs() + (self.scale - 1.0).abs()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Advances the controls by one step and moves `camera`. Returns whether
    /// the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        self.updates += 1;
        let before = camera.position;

        let offset = camera.position - self.target;
        let mut radius = offset.length();
        let (mut theta, mut phi) = if radius > 0.0 {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, 0.0)
        };

        if self.enable_damping {
            theta += self.delta.theta * self.damping_factor;
            phi += self.delta.phi * self.damping_factor;
        } else {
            theta += self.delta.theta;
            phi += self.delta.phi;
        }

        phi = phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = self.target + offset;
        camera.target = self.target;

        if self.enable_damping {
            self.delta.theta *= 1.0 - self.damping_factor;
            self.delta.phi *= 1.0 - self.damping_factor;
        } else {
            self.delta = SphericalDelta::default();
        }
        self.scale = 1.0;

        camera.position.distance_squared(before) > EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(75.0, 16.0 / 9.0, 0.1, 100.0);
        camera.position = Vec3::new(0.0, 1.0, 6.0);
        camera.target = Vec3::ZERO;
        camera
    }

    #[test]
    fn idle_controls_keep_camera_still() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO);

        assert!(!controls.update(&mut camera));
        assert!((camera.position - Vec3::new(0.0, 1.0, 6.0)).length() < 1e-4);
    }

    #[test]
    fn damping_eases_motion_out() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.enable_damping = true;
        controls.rotate(200.0, 0.0, 720.0);

        let mut previous = controls.pending_motion();
        let radius = camera.position.length();
        for _ in 0..60 {
            controls.update(&mut camera);
            let pending = controls.pending_motion();
            assert!(pending <= previous);
            previous = pending;
        }

        assert!(previous > 0.0);
        assert!((camera.position.length() - radius).abs() < 1e-3);
        assert_eq!(controls.updates(), 60);
    }

    #[test]
    fn undamped_rotation_applies_at_once() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO);
        controls.rotate(180.0, 0.0, 360.0);

        assert!(controls.update(&mut camera));
        assert_eq!(controls.pending_motion(), 0.0);
        assert!(camera.position.z < 0.0);
    }

    #[test]
    fn dolly_scales_radius_once() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO);
        let radius = camera.position.length();

        controls.dolly(2.0);
        controls.update(&mut camera);
        controls.update(&mut camera);

        assert!((camera.position.length() - radius * 2.0).abs() < 1e-3);
    }

    #[test]
    fn projection_tracks_aspect() {
        let mut camera = camera();
        let before = camera.projection_matrix();
        camera.aspect = 1.0;
        camera.update_projection_matrix();

        assert_ne!(before, camera.projection_matrix());
        assert_eq!(camera.forward(), (Vec3::ZERO - Vec3::new(0.0, 1.0, 6.0)).normalize());
    }

    #[test]
    fn view_matrix_puts_the_target_ahead() {
        let mut camera = camera();
        let target = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!(target.z < 0.0);
        assert!(target.x.abs() < 1e-5 && target.y.abs() < 1e-5);

        camera.position = Vec3::new(0.0, 4.0, 0.0);
        assert!(camera.view_matrix().is_finite());
        camera.position = camera.target;
        assert!(camera.view_matrix().is_finite());
    }
}
