//! Host-side image assembly and PNG output.

use std::path::Path;

use crate::error::{RenderError, Result};

use super::tile::TileRegion;

/// Accumulated radiance and filter weight of one rendered region, read back
/// from the device. Row-major over the region, row 0 at the region's `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePixels {
    pub region: TileRegion,
    pub r: Vec<f32>,
    pub g: Vec<f32>,
    pub b: Vec<f32>,
    pub weight: Vec<f32>,
}

/// Converts a normalised channel value to 8 bits, saturating outside [0, 1].
pub fn to_byte(value: f32) -> u8 {
    // `as` maps NaN to 0.
    (value * 255.0).clamp(0.0, 255.0) as u8
}

/// Full-resolution accumulation buffer.
///
/// Pixel `(0, 0)` is the bottom-left of the image plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Film {
    width: u32,
    height: u32,
    /// `[r, g, b, weight]` per pixel.
    data: Vec<[f32; 4]>,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, data: vec![[0.0; 4]; width as usize * height as usize] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `[r, g, b, weight]` of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.data[self.index(x, y)]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Copies a region into place.
    pub fn add_tile(&mut self, tile: &TilePixels) -> Result<()> {
        let TileRegion { x, y, width, height } = tile.region;
        let expected = width as usize * height as usize;
        let lengths = [tile.r.len(), tile.g.len(), tile.b.len(), tile.weight.len()];
        if lengths.iter().any(|&n| n != expected) {
            return Err(RenderError::Scene(format!(
                "tile at ({}, {}) has {:?} values, expected {}",
                x, y, lengths, expected
            )));
        }
        if x.saturating_add(width) > self.width || y.saturating_add(height) > self.height {
            return Err(RenderError::Scene(format!(
                "tile {:?} lies outside the {}x{} image",
                tile.region, self.width, self.height
            )));
        }

        for row in 0..height {
            for col in 0..width {
                let src = (row * width + col) as usize;
                let dst = self.index(x + col, y + row);
                self.data[dst] = [tile.r[src], tile.g[src], tile.b[src], tile.weight[src]];
            }
        }
        Ok(())
    }

    /// 8-bit RGB raster, top row first (vertically flipped).
    ///
    /// Each channel is `accumulated / weight`; pixels without weight are black.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 3);
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let [r, g, b, w] = self.pixel(x, y);
                if w > 0.0 {
                    let inv = 1.0 / w;
                    out.extend_from_slice(&[to_byte(r * inv), to_byte(g * inv), to_byte(b * inv)]);
                } else {
                    out.extend_from_slice(&[0, 0, 0]);
                }
            }
        }
        out
    }

    /// Encodes [`Film::to_rgb8`] as a PNG at `path`.
    pub fn write_png(&self, path: &Path) -> Result<()> {
        image::save_buffer(path, &self.to_rgb8(), self.width, self.height, image::ExtendedColorType::Rgb8)
            .map_err(|source| RenderError::Image { path: path.to_path_buf(), source })?;
        log::info!("wrote {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: u32, y: u32, w: u32, h: u32, value: f32, weight: f32) -> TilePixels {
        let n = (w * h) as usize;
        TilePixels {
            region: TileRegion { x, y, width: w, height: h },
            r: vec![value; n],
            g: vec![value * 0.5; n],
            b: vec![0.0; n],
            weight: vec![weight; n],
        }
    }

    #[test]
    fn byte_conversion_saturates() {
        assert_eq!(to_byte(0.0), 0);
        assert_eq!(to_byte(1.0), 255);
        assert_eq!(to_byte(0.5), 127);
        assert_eq!(to_byte(7.5), 255);
        assert_eq!(to_byte(-1.0), 0);
        assert_eq!(to_byte(f32::NAN), 0);
        assert_eq!(to_byte(f32::INFINITY), 255);
    }

    #[test]
    fn divides_by_weight() {
        let mut film = Film::new(1, 1);
        film.add_tile(&tile(0, 0, 1, 1, 2.0, 4.0)).unwrap();
        assert_eq!(film.to_rgb8(), vec![127, 63, 0]);
    }

    #[test]
    fn zero_weight_is_black() {
        let mut film = Film::new(1, 1);
        film.add_tile(&tile(0, 0, 1, 1, 5.0, 0.0)).unwrap();
        assert_eq!(film.to_rgb8(), vec![0, 0, 0]);
    }

    #[test]
    fn rows_are_flipped() {
        let mut film = Film::new(1, 2);
        // bottom row bright, top row dark
        film.add_tile(&tile(0, 0, 1, 1, 1.0, 1.0)).unwrap();
        film.add_tile(&tile(0, 1, 1, 1, 0.0, 1.0)).unwrap();
        let rgb = film.to_rgb8();
        assert_eq!(&rgb[..3], &[0, 0, 0]);
        assert_eq!(&rgb[3..], &[255, 127, 0]);
    }

    #[test]
    fn tiles_land_at_their_offset() {
        let mut film = Film::new(4, 2);
        film.add_tile(&tile(2, 1, 2, 1, 1.0, 1.0)).unwrap();
        assert_eq!(film.pixel(3, 1), [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(film.pixel(1, 1), [0.0; 4]);
    }

    #[test]
    fn rejects_out_of_bounds_tile() {
        let mut film = Film::new(2, 2);
        assert!(film.add_tile(&tile(1, 1, 2, 1, 1.0, 1.0)).is_err());
    }

    #[test]
    fn writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("film.png");
        let mut film = Film::new(3, 2);
        film.add_tile(&tile(0, 0, 3, 2, 1.0, 1.0)).unwrap();
        film.write_png(&path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 127, 0]);
    }

    #[test]
    fn png_error_carries_path() {
        let film = Film::new(1, 1);
        let path = Path::new("/definitely/not/a/dir/out.png");
        let err = film.write_png(path).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/a/dir/out.png"), "{err}");
    }
}
