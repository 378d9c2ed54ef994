/// Diffuse material: reflectance and emitted radiance, both linear RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub reflectance: [f32; 3],
    pub emission: [f32; 3],
}

impl Material {
    pub fn is_emissive(&self) -> bool {
        self.emission.iter().any(|&e| e > 0.0)
    }
}

/// Sphere primitive referencing a material by index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: [f32; 3],
    pub radius: f32,
    pub material: u32,
}

/// Everything a scene file describes: output size, tiling, sampling budget
/// and geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescription {
    pub image_width: u32,
    pub image_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub pixel_samples: u32,
    pub materials: Vec<Material>,
    pub spheres: Vec<Sphere>,
}

impl SceneDescription {
    /// Per-sphere material indices, in sphere order.
    pub fn material_indices(&self) -> Vec<u32> {
        self.spheres.iter().map(|s| s.material).collect()
    }

    /// Tile size clamped to the image, so a tile never exceeds the frame.
    pub fn effective_tile_size(&self) -> (u32, u32) {
        (
            self.tile_width.min(self.image_width),
            self.tile_height.min(self.image_height),
        )
    }
}
