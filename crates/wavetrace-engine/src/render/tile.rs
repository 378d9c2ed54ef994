//! Tile geometry.

/// Size and sample budget of one tile.
///
/// Pure value type: no device resources hang off it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TileDescription {
    pub width: u32,
    pub height: u32,
    pub pixel_samples: u32,
}

impl TileDescription {
    pub const fn new(width: u32, height: u32, pixel_samples: u32) -> Self {
        Self { width, height, pixel_samples }
    }

    /// `width * height`.
    pub const fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// `width * height * pixel_samples`: one lane per sample.
    pub const fn total_samples(&self) -> u64 {
        self.total_pixels() * self.pixel_samples as u64
    }
}

/// A rectangle of the output image rendered by one pass of the tile pipeline.
///
/// `width`/`height` may be smaller than the pipeline's [`TileDescription`] on
/// the right and bottom edges of the image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TileRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRegion {
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True if the pixel lies inside this region.
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && py >= self.y && px - self.x < self.width && py - self.y < self.height
    }
}

/// Splits an image into row-major tiles of at most `tile_width x tile_height`.
///
/// Zero-sized inputs yield no tiles.
pub fn tile_regions(
    image_width: u32,
    image_height: u32,
    tile_width: u32,
    tile_height: u32,
) -> impl Iterator<Item = TileRegion> {
    let step_x = tile_width.max(1);
    let step_y = tile_height.max(1);
    let (cols, rows) = if tile_width == 0 || tile_height == 0 {
        (0, 0)
    } else {
        (image_width.div_ceil(step_x), image_height.div_ceil(step_y))
    };

    (0..rows).flat_map(move |row| {
        (0..cols).map(move |col| {
            let x = col * step_x;
            let y = row * step_y;
            TileRegion {
                x,
                y,
                width: step_x.min(image_width - x),
                height: step_y.min(image_height - y),
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small deterministic generator for parameter sweeps.
    struct Sweep(u32);

    impl Sweep {
        fn next(&mut self, bound: u32) -> u32 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 17;
            self.0 ^= self.0 << 5;
            1 + self.0 % bound
        }
    }

    #[test]
    fn totals_are_products() {
        let mut rng = Sweep(0x9e37_79b9);
        for _ in 0..1000 {
            let (w, h, s) = (rng.next(4096), rng.next(4096), rng.next(1024));
            let tile = TileDescription::new(w, h, s);
            assert_eq!(tile.total_pixels(), u64::from(w) * u64::from(h));
            assert_eq!(tile.total_samples(), u64::from(w) * u64::from(h) * u64::from(s));
            // Pure: asking twice gives the same answer.
            assert_eq!(tile.total_samples(), tile.total_samples());
        }
    }

    #[test]
    fn totals_do_not_overflow_u32() {
        let tile = TileDescription::new(u32::MAX, 2, 3);
        assert_eq!(tile.total_samples(), u64::from(u32::MAX) * 6);
    }

    #[test]
    fn single_tile_when_tile_covers_image() {
        let tiles: Vec<_> = tile_regions(64, 48, 64, 48).collect();
        assert_eq!(tiles, vec![TileRegion { x: 0, y: 0, width: 64, height: 48 }]);
    }

    #[test]
    fn edge_tiles_are_clipped() {
        let tiles: Vec<_> = tile_regions(10, 5, 4, 4).collect();
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles[2], TileRegion { x: 8, y: 0, width: 2, height: 4 });
        assert_eq!(tiles[5], TileRegion { x: 8, y: 4, width: 2, height: 1 });
    }

    #[test]
    fn tiles_partition_the_image() {
        let mut rng = Sweep(12345);
        for _ in 0..200 {
            let (iw, ih) = (rng.next(70), rng.next(70));
            let (tw, th) = (rng.next(20), rng.next(20));
            let tiles: Vec<_> = tile_regions(iw, ih, tw, th).collect();
            let covered: u64 = tiles.iter().map(TileRegion::pixel_count).sum();
            assert_eq!(covered, u64::from(iw) * u64::from(ih));
            for py in 0..ih {
                for px in 0..iw {
                    let owners = tiles.iter().filter(|t| t.contains(px, py)).count();
                    assert_eq!(owners, 1, "pixel ({px},{py}) in {iw}x{ih} / {tw}x{th}");
                }
            }
        }
    }

    #[test]
    fn zero_tile_size_yields_nothing() {
        assert_eq!(tile_regions(8, 8, 0, 4).count(), 0);
        assert_eq!(tile_regions(0, 8, 4, 4).count(), 0);
    }
}
