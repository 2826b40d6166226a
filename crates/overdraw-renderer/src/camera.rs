//! Orbit camera used by hosts that have no camera system of their own.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Per-frame uniform shared by every geometry-pass material (group 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl FrameUniform {
    pub fn new(view_proj: Mat4) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
        }
    }
}

/// Camera orbiting a target point
pub struct Camera {
    pub distance: f32,
    pub rotation: Quat,
    pub target: Vec3,
    pub aspect: f32,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            distance: 10.0,
            rotation: Quat::IDENTITY,
            target: Vec3::ZERO,
            aspect: width as f32 / height.max(1) as f32,
            fovy: 45.0_f32.to_radians(),
            znear: 0.1,
            zfar: 1000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        let offset = self.rotation * Vec3::new(0.0, 0.0, self.distance);
        self.target + offset
    }

    /// Unit vector the camera looks along.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn rotate(&mut self, delta_x: f32, delta_y: f32) {
        let up = self.rotation * Vec3::Y;
        let yaw_rotation = Quat::from_axis_angle(up, delta_x);

        let right = self.rotation * Vec3::X;
        let pitch_rotation = Quat::from_axis_angle(right, -delta_y);

        self.rotation = yaw_rotation * pitch_rotation * self.rotation;
        self.rotation = self.rotation.normalize();
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance + delta).clamp(1.0, 500.0);
    }

    pub fn build_view_projection_matrix(&self) -> Mat4 {
        let position = self.position();
        let rotation_matrix = Mat4::from_quat(self.rotation.conjugate());
        let translation_matrix = Mat4::from_translation(-position);
        let view = rotation_matrix * translation_matrix;
        let proj = Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar);
        proj * view
    }

    /// Distance of `point` in front of the camera, used as a draw sort key.
    pub fn view_depth(&self, point: Vec3) -> f32 {
        (point - self.position()).dot(self.forward())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_depth_orders_points() {
        let camera = Camera::new(800, 600);
        // Default camera sits on +Z looking towards the origin.
        let near = camera.view_depth(Vec3::new(0.0, 0.0, 5.0));
        let far = camera.view_depth(Vec3::new(0.0, 0.0, -5.0));

        assert!((near - 5.0).abs() < 1e-5);
        assert!((far - 15.0).abs() < 1e-5);
        assert!(near < far);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::new(800, 600);
        camera.zoom(-100.0);
        assert_eq!(camera.distance, 1.0);
        camera.zoom(10_000.0);
        assert_eq!(camera.distance, 500.0);
    }

    #[test]
    fn test_resize_zero_height_keeps_aspect_finite() {
        let mut camera = Camera::new(800, 600);
        camera.resize(800, 0);
        assert!(camera.aspect.is_finite());
    }
}
