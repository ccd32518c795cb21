// THEORY:
// The `Pixel` module is the most fundamental unit of the extraction engine. A
// composite sheet is only ever consulted through one question per pixel: is it
// occupied sprite content or transparent background? Everything above this
// layer (components, clusters, bounding boxes) is built from that single bit of
// evidence plus the pixel's coordinates.
//
// Key principles:
// 1) Read-only evidence: pixels are read from a borrowed `RgbaImage` and never
//    written back. Segmenters do not own or copy the source canvas.
// 2) One opacity rule: both segmentation strategies share `AlphaThreshold`, so
//    "opaque" means the same thing everywhere.
// 3) Transient: `OpaquePixel`s live only for the segmentation pass that
//    collects them.

pub mod pixel {
    use image::RgbaImage;
    use serde::Deserialize;

    pub type Alpha = u8;

    /// The opacity cut-off. A pixel is opaque iff its alpha strictly exceeds it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(transparent)]
    pub struct AlphaThreshold(pub Alpha);

    impl AlphaThreshold {
        pub fn is_opaque(self, alpha: Alpha) -> bool {
            alpha > self.0
        }
    }

    /// A "dumb" data container for the coordinates of one opaque pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpaquePixel {
        pub x: u32,
        pub y: u32,
    }

    /// Reads the alpha channel at `(x, y)`.
    pub fn alpha_at(image: &RgbaImage, x: u32, y: u32) -> Alpha {
        image.get_pixel(x, y).0[3]
    }

    /// Checks a single pixel of the canvas against the threshold.
    pub fn is_opaque_at(image: &RgbaImage, x: u32, y: u32, threshold: AlphaThreshold) -> bool {
        threshold.is_opaque(alpha_at(image, x, y))
    }

    /// Collects every opaque pixel of the canvas in row-major scan order.
    pub fn collect_opaque_pixels(image: &RgbaImage, threshold: AlphaThreshold) -> Vec<OpaquePixel> {
        image
            .enumerate_pixels()
            .filter(|(_, _, px)| threshold.is_opaque(px.0[3]))
            .map(|(x, y, _)| OpaquePixel { x, y })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn threshold_is_strict() {
        let threshold = AlphaThreshold(80);
        assert!(!threshold.is_opaque(80));
        assert!(threshold.is_opaque(81));
        assert!(!AlphaThreshold(255).is_opaque(255));
    }

    #[test]
    fn collects_in_scan_order() {
        let mut image = RgbaImage::new(4, 3);
        image.put_pixel(3, 0, Rgba([10, 10, 10, 255]));
        image.put_pixel(1, 2, Rgba([10, 10, 10, 255]));
        image.put_pixel(0, 1, Rgba([10, 10, 10, 40]));

        let opaque = collect_opaque_pixels(&image, AlphaThreshold(50));
        assert_eq!(opaque, vec![OpaquePixel { x: 3, y: 0 }, OpaquePixel { x: 1, y: 2 }]);
        assert!(is_opaque_at(&image, 0, 1, AlphaThreshold(39)));
    }
}
