// THEORY:
// The `ComponentDetector` discovers an unknown number of sprites on a composite
// sheet. It is a classic binary connected-component analysis over the alpha
// channel, tuned for hand-authored art where characters are separated by fully
// transparent gutters.
//
// Algorithm steps:
// 1.  **Scan**: walk the canvas in row-major order. Every opaque pixel that has
//     not been visited yet is the seed of a new region.
// 2.  **Flood Fill**: grow the region breadth-first over all 8 neighbours
//     (diagonals included) using an explicit queue and a flat visited grid, so
//     large sprites never hit recursion limits and membership tests stay O(1).
//     Pixel count and the running min/max on both axes are tracked as we go.
// 3.  **Noise Filtering**: antialiasing fringes and stray specks also form
//     components. A region survives only if it has at least `min_pixels` pixels
//     AND is at least `min_height` rows tall.
// 4.  **Ordering**: survivors are sorted by `(min_y, min_x)`, which gives the same
//     reading order no matter how the scan happened to encounter them.
//
// The detector never decides which components are "real" beyond those filters.
// `find_exact` compares the result against the caller's expected count and fails
// loudly on any disagreement.

use crate::core_modules::pixel::pixel::AlphaThreshold;
use serde::Deserialize;

/// Tunables for connected-component discovery.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Pixels with alpha above this value are sprite content.
    pub alpha_threshold: AlphaThreshold,
    /// Smallest pixel count a region needs to be kept.
    pub min_pixels: usize,
    /// Smallest height, in rows, a region needs to be kept.
    pub min_height: u32,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: AlphaThreshold(80),
            min_pixels: 500,
            min_height: 100,
        }
    }
}

pub mod component_detector {
    use super::*;
    use crate::core_modules::bounding_box::BoundingBox;
    use crate::core_modules::pixel::pixel::is_opaque_at;
    use crate::core_modules::sprite_region::SpriteRegion;
    use crate::error::{Result, SpriteError};
    use image::RgbaImage;
    use std::collections::VecDeque;

    /// Finds every connected opaque region that passes the noise filters,
    /// sorted top-to-bottom, then left-to-right.
    pub fn find_components(image: &RgbaImage, config: &ComponentConfig) -> Vec<SpriteRegion> {
        let (width, height) = image.dimensions();
        let mut visited = vec![false; width as usize * height as usize];
        let mut regions: Vec<SpriteRegion> = Vec::new();
        let mut rejected = 0usize;

        for y in 0..height {
            for x in 0..width {
                let index = pixel_index(x, y, width);
                if visited[index] || !is_opaque_at(image, x, y, config.alpha_threshold) {
                    continue;
                }

                let region = flood_fill(image, config.alpha_threshold, &mut visited, x, y);
                if region.pixel_count < config.min_pixels
                    || region.bounds.height() < config.min_height
                {
                    rejected += 1;
                    continue;
                }

                tracing::debug!(
                    bounds = %region.bounds,
                    pixels = region.pixel_count,
                    "sprite component found"
                );
                regions.push(region);
            }
        }

        regions.sort_by_key(SpriteRegion::reading_order_key);
        tracing::debug!(kept = regions.len(), rejected, "component scan complete");
        regions
    }

    /// Like `find_components`, but fails unless exactly `expected` regions are found.
    pub fn find_exact(
        image: &RgbaImage,
        config: &ComponentConfig,
        expected: usize,
    ) -> Result<Vec<SpriteRegion>> {
        let regions = find_components(image, config);
        if regions.len() != expected {
            tracing::warn!(expected, found = regions.len(), "component count mismatch");
            return Err(SpriteError::ComponentCountMismatch {
                expected,
                found: regions.len(),
            });
        }
        Ok(regions)
    }

    /// Breadth-first fill from a seed pixel over 8-connected opaque neighbours.
    fn flood_fill(
        image: &RgbaImage,
        threshold: AlphaThreshold,
        visited: &mut [bool],
        seed_x: u32,
        seed_y: u32,
    ) -> SpriteRegion {
        let (width, height) = image.dimensions();
        let mut queue: VecDeque<(u32, u32)> = VecDeque::new();
        queue.push_back((seed_x, seed_y));
        visited[pixel_index(seed_x, seed_y, width)] = true;

        let seed = i64::from(seed_x);
        let mut bounds = BoundingBox::new(seed, i64::from(seed_y), seed, i64::from(seed_y));
        let mut pixel_count = 0usize;

        while let Some((cx, cy)) = queue.pop_front() {
            pixel_count += 1;
            bounds = bounds.include(cx.into(), cy.into());

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = i64::from(cx) + dx;
                    let ny = i64::from(cy) + dy;
                    if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                        continue;
                    }

                    let (nx, ny) = (nx as u32, ny as u32);
                    let index = pixel_index(nx, ny, width);
                    if visited[index] || !is_opaque_at(image, nx, ny, threshold) {
                        continue;
                    }
                    visited[index] = true;
                    queue.push_back((nx, ny));
                }
            }
        }

        SpriteRegion { bounds, pixel_count }
    }

    /// Row-major offset into the visited grid, widened before multiplying.
    pub(crate) fn pixel_index(x: u32, y: u32, width: u32) -> usize {
        y as usize * width as usize + x as usize
    }
}
