use glam::{Mat4, Vec3, Vec4};

/// Camera circling a target point, always looking at it.
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub aspect: f32,
    pub fov: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl OrbitCamera {
    pub fn new(aspect: f32) -> OrbitCamera {
        OrbitCamera {
            target: Vec3::ZERO,
            distance: 30.0,
            pitch: 0.5,
            yaw: 0.0,
            aspect,
            fov: 70.0,
            znear: 0.5,
            zfar: 500.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        self.target + Vec3::new(cos_pitch * sin_yaw, sin_pitch, -cos_pitch * cos_yaw) * self.distance
    }

    /// Keeps the camera off the poles and outside the near plane.
    pub fn clamp(&mut self) {
        self.pitch = self.pitch.clamp(-1.5, 1.5);
        self.distance = self.distance.clamp(self.znear * 4.0, self.zfar * 0.5);
    }

    pub fn get_view_mat(&self) -> Mat4 {
        Mat4::look_at_lh(self.position(), self.target, Vec3::Y)
    }

    /// Left-handed projection mapping view depth `znear..zfar` to `0..1`.
    pub fn get_projection_mat(&self) -> Mat4 {
        let (sin_fov, cos_fov) = f32::sin_cos(0.5 * self.fov.to_radians());
        let h = cos_fov / sin_fov;
        let w = h / self.aspect;
        let r = self.zfar / (self.zfar - self.znear);

        Mat4::from_cols(
            Vec4::new(w, 0.0, 0.0, 0.0),
            Vec4::new(0.0, h, 0.0, 0.0),
            Vec4::new(0.0, 0.0, r, 1.0),
            Vec4::new(0.0, 0.0, -r * self.znear, 0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_matches_glam() {
        let camera = OrbitCamera::new(16.0 / 9.0);
        let expected = Mat4::perspective_lh(camera.fov.to_radians(), camera.aspect, camera.znear, camera.zfar);
        assert!(camera.get_projection_mat().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn target_lands_in_front_of_the_camera() {
        let mut camera = OrbitCamera::new(1.0);
        camera.yaw = 1.2;
        camera.target = Vec3::new(3.0, 1.0, -2.0);

        let view_target = camera.get_view_mat().transform_point3(camera.target);
        assert!(view_target.truncate().length() < 1e-3);
        assert!((view_target.z - camera.distance).abs() < 1e-3);
    }

    #[test]
    fn clamp_keeps_distance_in_range() {
        let mut camera = OrbitCamera::new(1.0);
        camera.distance = 0.0;
        camera.pitch = 3.0;
        camera.clamp();
        assert_eq!(camera.distance, camera.znear * 4.0);
        assert_eq!(camera.pitch, 1.5);
    }
}
