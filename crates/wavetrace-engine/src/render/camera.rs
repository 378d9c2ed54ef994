use glam::Vec3;

use super::gpu_types::GpuCamera;

/// Pinhole camera.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view, in degrees.
    pub fov_degrees: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 10.0),
            look_at: Vec3::ZERO,
            up: Vec3::Y,
            fov_degrees: 45.0,
        }
    }
}

impl Camera {
    /// Orthonormal basis `(u, v, w)`; `w` points from the target back to the eye.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let w = (self.eye - self.look_at).normalize();
        let u = self.up.cross(w).normalize();
        let v = w.cross(u);
        (u, v, w)
    }

    /// Packs the camera for the given image size.
    pub fn to_gpu(&self, image_width: u32, image_height: u32) -> GpuCamera {
        let (u, v, w) = self.basis();
        let bottom = -(self.fov_degrees.to_radians() / 2.0).tan();
        let left = bottom * image_width as f32 / image_height as f32;

        GpuCamera {
            eye_x: self.eye.x,
            eye_y: self.eye.y,
            eye_z: self.eye.z,
            u_x: u.x,
            u_y: u.y,
            u_z: u.z,
            v_x: v.x,
            v_y: v.y,
            v_z: v.z,
            w_x: w.x,
            w_y: w.y,
            w_z: w.z,
            bottom,
            left,
            image_width,
            image_height,
            inv_width: 1.0 / image_width as f32,
            inv_height: 1.0 / image_height as f32,
            _pad: [0; 2],
        }
    }

    /// Host mirror of the kernel's primary-ray direction.
    #[cfg(test)]
    pub(crate) fn ray_direction(gpu: &GpuCamera, px: u32, py: u32, sx: f32, sy: f32) -> Vec3 {
        let vp_x = gpu.left * (1.0 - 2.0 * (px as f32 + sx) * gpu.inv_width);
        let vp_y = gpu.bottom * (1.0 - 2.0 * (py as f32 + sy) * gpu.inv_height);
        let u = Vec3::new(gpu.u_x, gpu.u_y, gpu.u_z);
        let v = Vec3::new(gpu.v_x, gpu.v_y, gpu.v_z);
        let w = Vec3::new(gpu.w_x, gpu.w_y, gpu.w_z);
        (vp_x * u + vp_y * v - w).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn default_basis_is_axis_aligned() {
        let (u, v, w) = Camera::default().basis();
        assert!(close(u, Vec3::X));
        assert!(close(v, Vec3::Y));
        assert!(close(w, Vec3::Z));
    }

    #[test]
    fn image_centre_looks_at_target() {
        let cam = Camera::default();
        let gpu = cam.to_gpu(64, 64);
        // Pixel 32 with zero jitter sits exactly on the optical axis.
        let dir = Camera::ray_direction(&gpu, 32, 32, 0.0, 0.0);
        assert!(close(dir, -Vec3::Z), "{dir:?}");
    }

    #[test]
    fn pixel_zero_is_bottom_left() {
        let gpu = Camera::default().to_gpu(64, 32);
        let dir = Camera::ray_direction(&gpu, 0, 0, 0.0, 0.0);
        assert!(dir.x < 0.0 && dir.y < 0.0, "{dir:?}");
        // left = bottom * aspect
        assert!((gpu.left - 2.0 * gpu.bottom).abs() < 1e-6);
    }

    #[test]
    fn fov_sets_frustum_slope() {
        let gpu = Camera { fov_degrees: 90.0, ..Camera::default() }.to_gpu(10, 10);
        assert!((gpu.bottom + 1.0).abs() < 1e-6);
    }
}
