use wavetrace_scene::SceneDescription;

use crate::device::ComputeContext;
use crate::error::{RenderError, Result};

use super::buffers::DeviceArray;
use super::camera::Camera;
use super::gpu_types::{GpuCamera, GpuMaterial, GpuSphere};

const READ_ONLY: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE;

/// Immutable scene data, uploaded once per render.
#[derive(Debug)]
pub struct SceneBuffers {
    pub spheres: DeviceArray<GpuSphere>,
    pub materials: DeviceArray<GpuMaterial>,
    /// Material of each sphere, parallel to `spheres`.
    pub material_index: DeviceArray<u32>,
    pub camera: DeviceArray<GpuCamera>,
    num_spheres: u32,
    num_materials: u32,
    image_size: (u32, u32),
}

impl SceneBuffers {
    /// Uploads the scene. On error nothing stays allocated.
    pub fn new(ctx: &ComputeContext, scene: &SceneDescription, camera: &Camera) -> Result<Self> {
        let num_spheres = u32::try_from(scene.spheres.len())
            .map_err(|_| RenderError::Scene("too many spheres".into()))?;
        let num_materials = u32::try_from(scene.materials.len())
            .map_err(|_| RenderError::Scene("too many materials".into()))?;

        if let Some(bad) = scene.spheres.iter().find(|s| s.material >= num_materials) {
            return Err(RenderError::Scene(format!(
                "sphere material index {} out of range ({} materials)",
                bad.material, num_materials
            )));
        }

        let spheres: Vec<GpuSphere> = scene
            .spheres
            .iter()
            .map(|s| GpuSphere {
                center_x: s.center[0],
                center_y: s.center[1],
                center_z: s.center[2],
                radius: s.radius,
            })
            .collect();

        let materials: Vec<GpuMaterial> = scene
            .materials
            .iter()
            .map(|m| GpuMaterial {
                rho_r: m.reflectance[0],
                rho_g: m.reflectance[1],
                rho_b: m.reflectance[2],
                emission_r: m.emission[0],
                emission_g: m.emission[1],
                emission_b: m.emission[2],
            })
            .collect();

        let gpu_camera = camera.to_gpu(scene.image_width, scene.image_height);

        let buffers = Self {
            spheres: DeviceArray::from_slice(ctx, "scene.spheres", &spheres, READ_ONLY)?,
            materials: DeviceArray::from_slice(ctx, "scene.materials", &materials, READ_ONLY)?,
            material_index: DeviceArray::from_slice(
                ctx,
                "scene.material_index",
                &scene.material_indices(),
                READ_ONLY,
            )?,
            camera: DeviceArray::from_slice(
                ctx,
                "scene.camera",
                &[gpu_camera],
                wgpu::BufferUsages::UNIFORM,
            )?,
            num_spheres,
            num_materials,
            image_size: (scene.image_width, scene.image_height),
        };

        log::debug!("scene uploaded: {} spheres, {} materials", num_spheres, num_materials);
        Ok(buffers)
    }

    /// Sphere count, bound into the kernels' render parameters.
    pub fn num_spheres(&self) -> u32 {
        self.num_spheres
    }

    pub fn num_materials(&self) -> u32 {
        self.num_materials
    }

    /// Image size the camera was set up for.
    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<&wgpu::Buffer> {
        match name {
            "spheres" => Some(self.spheres.buffer()),
            "materials" => Some(self.materials.buffer()),
            "material_index" => Some(self.material_index.buffer()),
            "camera" => Some(self.camera.buffer()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_context;

    #[test]
    fn uploads_counts() {
        let Some(ctx) = test_context() else { return };
        let scene = wavetrace_scene::parse_str(
            "8 8 8 8 1  2  1 1 1 0 0 0  0 0 0 1 1 1  3  0 0 0 1 0  1 0 0 1 1  2 0 0 1 0",
        )
        .unwrap();
        let buffers = SceneBuffers::new(&ctx, &scene, &Camera::default()).unwrap();
        assert_eq!(buffers.num_spheres(), 3);
        assert_eq!(buffers.num_materials(), 2);
        assert_eq!(buffers.material_index.len(), 3);
    }

    #[test]
    fn empty_scene_is_padded() {
        let Some(ctx) = test_context() else { return };
        let scene = wavetrace_scene::parse_str("4 4 4 4 1 0 0").unwrap();
        let buffers = SceneBuffers::new(&ctx, &scene, &Camera::default()).unwrap();
        assert_eq!(buffers.num_spheres(), 0);
        assert!(buffers.spheres.is_empty());
        assert_eq!(buffers.spheres.buffer().size(), size_of::<GpuSphere>() as u64);
    }
}
