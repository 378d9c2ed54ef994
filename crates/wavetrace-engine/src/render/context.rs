use std::path::Path;
use std::time::Instant;

use wavetrace_scene::SceneDescription;

use crate::device::{ComputeContext, ComputeInit};
use crate::error::Result;

use super::film::Film;
use super::pipeline::TilePipeline;
use super::scene_buffers::SceneBuffers;
use super::settings::RenderSettings;
use super::tile::{tile_regions, TileDescription};

/// Top-level renderer: one compute device, any number of scenes.
///
/// Each render uploads the scene, builds a tile pipeline sized for the
/// scene's tile, renders every tile in row-major order and assembles the
/// result on the host. Device resources of a render are released when it
/// returns, on success or error.
#[derive(Debug)]
pub struct RenderingContext {
    compute: ComputeContext,
    settings: RenderSettings,
}

impl RenderingContext {
    /// Acquires a device and checks the settings.
    pub fn new(init: ComputeInit, settings: RenderSettings) -> Result<Self> {
        settings.validate()?;
        let compute = ComputeContext::new_blocking(init)?;
        Self::with_context(compute, settings)
    }

    /// Renders on an existing device.
    pub fn with_context(compute: ComputeContext, settings: RenderSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { compute, settings })
    }

    pub fn compute(&self) -> &ComputeContext {
        &self.compute
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Renders `scene` to convergence and returns the accumulated film.
    pub fn render_image(&self, scene: &SceneDescription) -> Result<Film> {
        let started = Instant::now();
        let (tile_width, tile_height) = scene.effective_tile_size();
        let tile = TileDescription::new(tile_width, tile_height, scene.pixel_samples);

        let scene_buffers = SceneBuffers::new(&self.compute, scene, &self.settings.camera)?;
        let mut pipeline = TilePipeline::new(&self.compute, &scene_buffers, tile, &self.settings)?;
        let mut film = Film::new(scene.image_width, scene.image_height);

        let regions: Vec<_> =
            tile_regions(scene.image_width, scene.image_height, tile_width, tile_height).collect();
        log::info!(
            "rendering {}x{} at {} spp: {} tile(s) of {}x{}, {} lanes",
            scene.image_width,
            scene.image_height,
            scene.pixel_samples,
            regions.len(),
            tile_width,
            tile_height,
            tile.total_samples()
        );

        for (n, region) in regions.iter().enumerate() {
            let stats = pipeline.render_region(*region)?;
            film.add_tile(&pipeline.read_pixels(*region)?)?;
            log::info!(
                "tile {}/{} at ({}, {}): {} samples, {} iterations, {} dispatches",
                n + 1,
                regions.len(),
                region.x,
                region.y,
                stats.samples_done,
                stats.iterations,
                stats.dispatches
            );
        }

        log::info!("render finished in {:.2?}", started.elapsed());
        Ok(film)
    }

    /// Renders `scene` and writes the image to `output` as PNG.
    pub fn render(&self, scene: &SceneDescription, output: &Path) -> Result<()> {
        self.render_image(scene)?.write_png(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_context;
    use crate::error::RenderError;

    fn context(settings: RenderSettings) -> Option<RenderingContext> {
        let compute = test_context()?;
        Some(RenderingContext::with_context(compute, settings).unwrap())
    }

    #[test]
    fn rejects_invalid_settings() {
        let Some(compute) = test_context() else { return };
        let settings = RenderSettings { max_depth: 0, ..RenderSettings::default() };
        assert!(matches!(
            RenderingContext::with_context(compute, settings),
            Err(RenderError::Settings(_))
        ));
    }

    #[test]
    fn renders_background_to_png() {
        let settings = RenderSettings { background: [1.0, 0.0, 0.5], ..RenderSettings::default() };
        let Some(ctx) = context(settings) else { return };
        let scene = wavetrace_scene::parse_str("3 2 3 2 2 0 0").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        ctx.render(&scene, &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert!(decoded.pixels().all(|p| p.0 == [255, 0, 127]));
    }

    #[test]
    fn edge_tiles_cover_the_whole_image() {
        let settings = RenderSettings { background: [0.5, 0.5, 0.5], ..RenderSettings::default() };
        let Some(ctx) = context(settings) else { return };
        let scene = wavetrace_scene::parse_str("5 3 2 2 3 0 0").unwrap();

        let film = ctx.render_image(&scene).unwrap();
        for y in 0..3 {
            for x in 0..5 {
                assert_eq!(film.pixel(x, y), [1.5, 1.5, 1.5, 3.0], "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn tile_larger_than_image_is_clamped() {
        let settings = RenderSettings { background: [1.0, 1.0, 1.0], ..RenderSettings::default() };
        let Some(ctx) = context(settings) else { return };
        let scene = wavetrace_scene::parse_str("2 2 64 64 1 0 0").unwrap();

        let film = ctx.render_image(&scene).unwrap();
        assert_eq!(film.to_rgb8(), vec![255; 12]);
    }

    #[test]
    fn lit_sphere_brightens_the_centre() {
        // Emissive unit sphere at the look-at point, black background.
        let Some(ctx) = context(RenderSettings::default()) else { return };
        let scene =
            wavetrace_scene::parse_str("9 9 9 9 4  1  0 0 0 1 1 1  1  0 0 0 1 0").unwrap();

        let film = ctx.render_image(&scene).unwrap();
        let [r, _, _, w] = film.pixel(4, 4);
        assert!(w > 0.0);
        assert!((r / w - 1.0).abs() < 1e-5, "centre radiance {}", r / w);
        assert_eq!(film.pixel(0, 0)[0], 0.0);
    }
}
