use glam::{Mat4, Vec3};

/// Clamp for the forward vector only, slightly less than π/2 so look_at never degenerates
const FORWARD_PITCH_LIMIT: f32 = 1.5533;

pub struct Camera {
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32, fov_y_degrees: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            eye: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            up: Vec3::Y,
            fov_y: fov_y_degrees.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near,
            z_far,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let cy = self.yaw;
        let cp = self.pitch.clamp(-FORWARD_PITCH_LIMIT, FORWARD_PITCH_LIMIT);
        Vec3::new(cy.cos() * cp.cos(), cp.sin(), cy.sin() * cp.cos()).normalize()
    }

    pub fn target(&self) -> Vec3 {
        self.eye + self.forward()
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target(), self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Normalized device coordinates (z in [0, 1]) back to world space
    pub fn unproject(&self, ndc: Vec3) -> Vec3 {
        self.view_proj().inverse().project_point3(ndc)
    }

    /// Direction from `origin` through the centre of the far plane, i.e. the crosshair ray.
    pub fn shoot_direction(&self, origin: Vec3) -> Vec3 {
        let dir = (self.unproject(Vec3::new(0.0, 0.0, 1.0)) - origin).normalize_or_zero();
        if dir == Vec3::ZERO { self.forward() } else { dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(800, 600, 75.0, 0.1, 1000.0)
    }

    #[test]
    fn test_forward_follows_yaw_and_pitch() {
        let mut cam = camera();
        assert!(cam.forward().abs_diff_eq(Vec3::X, 1e-6));
        cam.yaw = std::f32::consts::FRAC_PI_2;
        assert!(cam.forward().abs_diff_eq(Vec3::Z, 1e-6));
        cam.pitch = 10.0;
        assert!(cam.forward().y < 1.0 && cam.forward().y > 0.99);
    }

    #[test]
    fn test_unproject_far_centre_is_on_view_axis() {
        let mut cam = camera();
        cam.eye = Vec3::new(3.0, 5.0, -2.0);
        cam.yaw = 0.7;
        cam.pitch = -0.3;
        let far = cam.unproject(Vec3::new(0.0, 0.0, 1.0));
        let along = (far - cam.eye).dot(cam.forward());
        assert!((along - cam.z_far).abs() / cam.z_far < 1e-2, "far plane at {along}");
    }

    #[test]
    fn test_shoot_direction_from_eye_is_forward() {
        let mut cam = camera();
        cam.eye = Vec3::new(0.0, 5.0, 0.0);
        cam.yaw = -1.2;
        cam.pitch = 0.4;
        let dir = cam.shoot_direction(cam.eye);
        assert!(dir.abs_diff_eq(cam.forward(), 1e-3), "{dir} vs {}", cam.forward());
        assert!((dir.length() - 1.0).abs() < 1e-5);
    }
}
