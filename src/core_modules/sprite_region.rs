// THEORY:
// A `SpriteRegion` is the output of the connected-component layer. It summarizes
// one contiguous blob of opaque pixels found on a composite sheet: where it is
// (its tight bounding box) and how much evidence backs it (its pixel count).
//
// Key architectural principles:
// 1.  **Stateless Data Container**: like `OpaquePixel`, a region is a "dumb"
//     snapshot of a single segmentation pass. It keeps no pixel list and no
//     reference to the canvas it came from.
// 2.  **Filter Input**: the pixel count and box height are exactly what the
//     noise filters look at, so they are kept alongside the box for reporting.
// 3.  **Input for the Next Layer**: the ordered list of regions is what the
//     frame normalizer consumes, one box at a time.

use crate::core_modules::bounding_box::BoundingBox;

/// One connected blob of opaque pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteRegion {
    /// The tight, inclusive box around every pixel of the blob.
    pub bounds: BoundingBox,
    /// The number of opaque pixels reached by the flood fill.
    pub pixel_count: usize,
}

impl SpriteRegion {
    /// Ordering key for reading order: top-to-bottom, then left-to-right.
    pub fn reading_order_key(&self) -> (i64, i64) {
        (self.bounds.min_y(), self.bounds.min_x())
    }
}
