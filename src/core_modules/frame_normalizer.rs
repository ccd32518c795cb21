// THEORY:
// The `FrameNormalizer` turns one segmented region of a composite sheet into a
// canonical, runtime-ready frame: a fixed-size transparent canvas with the
// sprite scaled to fit and standing on a common floor line.
//
// Algorithm steps:
// 1.  **Crop**: pad the region by `margin` (clamped to the sheet) and cut it out.
// 2.  **Letterbox Scale**: `scale = min(footprint_w / crop_w, footprint_h / crop_h)`
//     fits the crop inside the footprint on both axes without distortion.
//     Presets for soft art cap it at 1.0 so small sprites are never blown up.
// 3.  **Resample**: resize by that scale with the configured filter. Pixel art
//     wants nearest-neighbour; painted silhouettes want Lanczos.
// 4.  **Anchor**: paste onto a transparent frame, centred horizontally and
//     flush with the bottom edge, so every character's feet share a baseline no
//     matter how tall the source drawing was.
//
// When the scale is exactly 1 the crop is pasted untouched. Re-normalizing an
// already normalized frame therefore reproduces it pixel for pixel.

use crate::core_modules::bounding_box::BoundingBox;
use crate::error::{Result, SpriteError};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::Deserialize;

/// Resampling filter used when scaling a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    /// Crisp pixel art.
    Nearest,
    /// Softened silhouettes.
    Lanczos,
}

impl ResampleFilter {
    fn filter_type(self) -> FilterType {
        match self {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// How fractional scaled sizes become whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Halves go to the even neighbour.
    Nearest,
    Ceil,
}

impl Rounding {
    fn apply(self, value: f64) -> f64 {
        match self {
            Rounding::Nearest => value.round_ties_even(),
            Rounding::Ceil => value.ceil(),
        }
    }
}

/// Frame geometry and resampling settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Width of the output canvas.
    pub frame_width: u32,
    /// Height of the output canvas.
    pub frame_height: u32,
    /// Largest width the scaled sprite may occupy.
    pub footprint_width: u32,
    /// Largest height the scaled sprite may occupy.
    pub footprint_height: u32,
    /// Padding around the tight region before cropping.
    pub margin: u32,
    pub filter: ResampleFilter,
    /// When false the scale never exceeds 1.0.
    pub allow_upscale: bool,
    pub rounding: Rounding,
}

impl NormalizeConfig {
    /// Crisp pixel-art frames where the sprite may fill the whole canvas.
    pub fn pixel_art(width: u32, height: u32) -> Self {
        Self {
            frame_width: width,
            frame_height: height,
            footprint_width: width,
            footprint_height: height,
            margin: 0,
            filter: ResampleFilter::Nearest,
            allow_upscale: true,
            rounding: Rounding::Nearest,
        }
    }

    /// Square, softly resampled frames with a smaller footprint and a margin.
    pub fn softened(frame_size: u32, footprint: u32, margin: u32) -> Self {
        Self {
            frame_width: frame_size,
            frame_height: frame_size,
            footprint_width: footprint.min(frame_size),
            footprint_height: footprint.min(frame_size),
            margin,
            filter: ResampleFilter::Lanczos,
            allow_upscale: false,
            rounding: Rounding::Ceil,
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self::pixel_art(32, 48)
    }
}

/// A fixed-size frame holding one normalized sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFrame {
    /// The frame pixels, always `frame_width x frame_height`.
    pub image: RgbaImage,
    /// The tight region the frame was built from.
    pub source_bounds: BoundingBox,
    /// The padded, clamped region that was actually cropped.
    pub crop_bounds: BoundingBox,
    /// The letterbox scale applied to the crop.
    pub scale: f64,
    /// Left edge of the pasted sprite inside the frame.
    pub offset_x: u32,
    /// Top edge of the pasted sprite inside the frame.
    pub offset_y: u32,
}

/// Letterbox scale for fitting `crop` into `footprint`, optionally capped at 1.
pub fn letterbox_scale(
    crop_width: u32,
    crop_height: u32,
    footprint_width: u32,
    footprint_height: u32,
    allow_upscale: bool,
) -> f64 {
    let scale = (f64::from(footprint_width) / f64::from(crop_width))
        .min(f64::from(footprint_height) / f64::from(crop_height));
    if allow_upscale { scale } else { scale.min(1.0) }
}

/// Crops `bounds` (plus margin) out of `source` and normalizes it into a frame.
pub fn normalize_frame(
    source: &RgbaImage,
    bounds: &BoundingBox,
    config: &NormalizeConfig,
) -> Result<NormalizedFrame> {
    let (sheet_width, sheet_height) = source.dimensions();
    let crop_bounds = bounds.expand(sheet_width, sheet_height, config.margin);

    // --- 1. Crop ---
    let crop = imageops::crop_imm(
        source,
        crop_bounds.min_x() as u32,
        crop_bounds.min_y() as u32,
        crop_bounds.width(),
        crop_bounds.height(),
    )
    .to_image();
    let (crop_width, crop_height) = crop.dimensions();

    // --- 2. Letterbox Scale ---
    // The footprint never exceeds the frame, on either axis.
    let footprint_width = config.footprint_width.min(config.frame_width);
    let footprint_height = config.footprint_height.min(config.frame_height);
    let scale = if crop_width == 0 || crop_height == 0 {
        0.0
    } else {
        letterbox_scale(
            crop_width,
            crop_height,
            footprint_width,
            footprint_height,
            config.allow_upscale,
        )
    };
    if !(scale.is_finite() && scale > 0.0) {
        return Err(SpriteError::DegenerateScale {
            bounds: crop_bounds,
            scale,
        });
    }

    // --- 3. Resample ---
    let scaled_width = scaled_dimension(crop_width, scale, config.rounding, footprint_width);
    let scaled_height = scaled_dimension(crop_height, scale, config.rounding, footprint_height);

    let resized = if (scaled_width, scaled_height) == (crop_width, crop_height) {
        crop
    } else {
        imageops::resize(&crop, scaled_width, scaled_height, config.filter.filter_type())
    };

    // --- 4. Anchor ---
    let offset_x = config.frame_width.saturating_sub(scaled_width) / 2;
    let offset_y = config.frame_height.saturating_sub(scaled_height);
    let mut image = RgbaImage::new(config.frame_width, config.frame_height);
    imageops::replace(&mut image, &resized, i64::from(offset_x), i64::from(offset_y));

    tracing::debug!(
        bounds = %bounds,
        crop = %crop_bounds,
        scale,
        scaled_width,
        scaled_height,
        "frame normalized"
    );

    Ok(NormalizedFrame {
        image,
        source_bounds: *bounds,
        crop_bounds,
        scale,
        offset_x,
        offset_y,
    })
}

fn scaled_dimension(length: u32, scale: f64, rounding: Rounding, limit: u32) -> u32 {
    let scaled = rounding.apply(f64::from(length) * scale);
    (scaled as u32).clamp(1, limit.max(1))
}
