// THEORY:
// A `BoundingBox` is the currency passed between the segmentation layer and the
// normalization layer. It is an immutable, axis-aligned rectangle with inclusive
// integer corners. Segmenters produce it from pixel evidence, the frame
// normalizer consumes it once, and placement metadata reports it back to the
// manifest writer.
//
// Key architectural principles:
// 1.  **Always valid**: construction orders the corners, so `min <= max` holds on
//     both axes and `width`/`height` are never below 1.
// 2.  **Canvas-safe**: `normalize` and `expand` clamp into `[0, dimension - 1]`.
//     They never fail. A region that falls completely off the canvas collapses
//     to a 1x1 box on the nearest edge rather than raising.
// 3.  **Value semantics**: nothing mutates a box in place. Clamping and expansion
//     return a new box.

use crate::core_modules::pixel::pixel::OpaquePixel;
use serde::Serialize;
use std::fmt;

/// An inclusive axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    min_x: i64,
    min_y: i64,
    max_x: i64,
    max_y: i64,
}

impl BoundingBox {
    /// Builds a box from two opposite corners in any order.
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// The box covering an entire canvas.
    pub fn full_canvas(canvas_width: u32, canvas_height: u32) -> Self {
        Self::new(
            0,
            0,
            last_index(canvas_width),
            last_index(canvas_height),
        )
    }

    /// The tight box around a set of pixels, or `None` for an empty set.
    pub fn from_pixels<'a, I>(pixels: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a OpaquePixel>,
    {
        let mut iter = pixels.into_iter();
        let first = iter.next()?;
        let seed = Self::new(first.x.into(), first.y.into(), first.x.into(), first.y.into());
        Some(iter.fold(seed, |acc, p| acc.include(p.x.into(), p.y.into())))
    }

    pub fn min_x(&self) -> i64 {
        self.min_x
    }

    pub fn min_y(&self) -> i64 {
        self.min_y
    }

    pub fn max_x(&self) -> i64 {
        self.max_x
    }

    pub fn max_y(&self) -> i64 {
        self.max_y
    }

    /// Saturates at `u32::MAX` for boxes wider than any image.
    pub fn width(&self) -> u32 {
        span(self.min_x, self.max_x)
    }

    /// Saturates at `u32::MAX` for boxes taller than any image.
    pub fn height(&self) -> u32 {
        span(self.min_y, self.max_y)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grows the box to include `(x, y)`.
    pub fn include(self, x: i64, y: i64) -> Self {
        Self {
            min_x: self.min_x.min(x),
            min_y: self.min_y.min(y),
            max_x: self.max_x.max(x),
            max_y: self.max_y.max(y),
        }
    }

    /// Clamps every corner into `[0, dimension - 1]`.
    pub fn normalize(&self, canvas_width: u32, canvas_height: u32) -> Self {
        let x_bound = last_index(canvas_width);
        let y_bound = last_index(canvas_height);
        Self::new(
            self.min_x.clamp(0, x_bound),
            self.min_y.clamp(0, y_bound),
            self.max_x.clamp(0, x_bound),
            self.max_y.clamp(0, y_bound),
        )
    }

    /// Pads every side by `margin`, then clamps like `normalize`.
    pub fn expand(&self, canvas_width: u32, canvas_height: u32, margin: u32) -> Self {
        let margin = i64::from(margin);
        Self::new(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
        .normalize(canvas_width, canvas_height)
    }
}

/// Highest valid index along an axis. A zero-length axis still maps to 0.
fn last_index(dimension: u32) -> i64 {
    (i64::from(dimension) - 1).max(0)
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]..[{}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

fn span(min: i64, max: i64) -> u32 {
    u32::try_from(max.saturating_sub(min).saturating_add(1)).unwrap_or(u32::MAX)
}
