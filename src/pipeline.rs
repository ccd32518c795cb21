// THEORY:
// The `pipeline` module is the top-level API for the extraction engine. It ties
// the layers together for a single composite sheet:
//
//   source sheet -> segmenter -> ordered boxes -> normalizer -> ordered frames
//
// Which segmenter runs, with which thresholds, and how frames are sized is all
// carried by `ExtractionConfig`, a plain data struct that callers either build
// in code or deserialize from a job file. The pipeline itself holds no state
// between calls. The source sheet is only ever borrowed.

use crate::core_modules::axis_cluster::{self, ClusterConfig};
use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::component_detector::{ComponentConfig, component_detector};
use crate::core_modules::frame_normalizer::{self, NormalizeConfig};
use crate::error::Result;
use image::RgbaImage;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;

// Re-export key data structures for the public API.
pub use crate::core_modules::atlas::{AtlasLayout, ComposedSheet, Placement};
pub use crate::core_modules::frame_normalizer::NormalizedFrame;

/// Which segmentation strategy to run on a sheet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segmentation {
    /// Discover an unknown number of 8-connected components.
    Components {
        #[serde(default)]
        filter: ComponentConfig,
        /// When set, any other component count is a hard failure.
        #[serde(default)]
        expected: Option<usize>,
    },
    /// Split a sheet of exactly `count` side-by-side sprites along x.
    AxisClusters(ClusterConfig),
}

impl Segmentation {
    pub fn name(&self) -> &'static str {
        match self {
            Segmentation::Components { .. } => "components",
            Segmentation::AxisClusters(_) => "axis_clusters",
        }
    }
}

impl Default for Segmentation {
    fn default() -> Self {
        Segmentation::Components {
            filter: ComponentConfig::default(),
            expected: None,
        }
    }
}

/// Configuration for the SpritePipeline.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub segmentation: Segmentation,
    pub normalize: NormalizeConfig,
    /// Fixed seed for cluster initialization. `None` draws from OS entropy.
    pub cluster_seed: Option<u64>,
}

impl ExtractionConfig {
    /// The atlas grid matching the normalized frame size.
    pub fn atlas_layout(&self) -> AtlasLayout {
        AtlasLayout::new(self.normalize.frame_width, self.normalize.frame_height)
    }
}

/// The sequential extraction engine for one configuration.
#[derive(Debug, Clone)]
pub struct SpritePipeline {
    config: ExtractionConfig,
}

impl SpritePipeline {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Segments `image` and normalizes every region, preserving segment order.
    pub fn extract(&self, image: &RgbaImage) -> Result<Vec<NormalizedFrame>> {
        let boxes = self.segment(image)?;
        self.normalize_all(image, &boxes)
    }

    /// Runs the configured segmenter with the configured random source.
    pub fn segment(&self, image: &RgbaImage) -> Result<Vec<BoundingBox>> {
        let mut rng = self.cluster_rng();
        self.segment_with_rng(image, &mut rng)
    }

    /// Runs the configured segmenter with a caller-supplied random source.
    pub fn segment_with_rng<R: Rng + ?Sized>(&self, image: &RgbaImage, rng: &mut R) -> Result<Vec<BoundingBox>> {
        let boxes = match &self.config.segmentation {
            Segmentation::Components { filter, expected } => {
                let regions = match expected {
                    Some(expected) => component_detector::find_exact(image, filter, *expected)?,
                    None => component_detector::find_components(image, filter),
                };
                regions.into_iter().map(|region| region.bounds).collect()
            }
            Segmentation::AxisClusters(cluster) => axis_cluster::find_clusters(image, cluster, rng)?,
        };

        tracing::info!(
            strategy = self.config.segmentation.name(),
            width = image.width(),
            height = image.height(),
            regions = boxes.len(),
            "sheet segmented"
        );
        Ok(boxes)
    }

    /// Normalizes each box in order. The first failing box aborts the batch.
    pub fn normalize_all(&self, image: &RgbaImage, boxes: &[BoundingBox]) -> Result<Vec<NormalizedFrame>> {
        boxes
            .iter()
            .map(|bounds| frame_normalizer::normalize_frame(image, bounds, &self.config.normalize))
            .collect()
    }

    fn cluster_rng(&self) -> StdRng {
        match self.config.cluster_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::AlphaThreshold;
    use crate::error::SpriteError;
    use image::Rgba;

    fn sheet_with_blocks(width: u32, height: u32, blocks: &[BoundingBox]) -> RgbaImage {
        let mut image = RgbaImage::new(width, height);
        for block in blocks {
            for y in block.min_y()..=block.max_y() {
                for x in block.min_x()..=block.max_x() {
                    image.put_pixel(x as u32, y as u32, Rgba([120, 60, 200, 255]));
                }
            }
        }
        image
    }

    fn component_config(expected: Option<usize>) -> ExtractionConfig {
        ExtractionConfig {
            segmentation: Segmentation::Components {
                filter: ComponentConfig {
                    alpha_threshold: AlphaThreshold(80),
                    min_pixels: 20,
                    min_height: 5,
                },
                expected,
            },
            normalize: NormalizeConfig::pixel_art(16, 16),
            cluster_seed: None,
        }
    }

    #[test]
    fn components_flow_into_fixed_size_frames() {
        let blocks = [BoundingBox::new(2, 2, 9, 17), BoundingBox::new(20, 4, 29, 13)];
        let sheet = sheet_with_blocks(40, 20, &blocks);

        let frames = SpritePipeline::new(component_config(Some(2))).extract(&sheet).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].source_bounds, blocks[0]);
        assert_eq!(frames[1].source_bounds, blocks[1]);
        assert!(frames.iter().all(|f| f.image.dimensions() == (16, 16)));
    }

    #[test]
    fn unexpected_component_count_halts_extraction() {
        let sheet = sheet_with_blocks(40, 20, &[BoundingBox::new(2, 2, 9, 17)]);
        let result = SpritePipeline::new(component_config(Some(3))).extract(&sheet);
        assert!(matches!(
            result,
            Err(SpriteError::ComponentCountMismatch { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn seeded_clustering_is_reproducible() {
        let blocks = [
            BoundingBox::new(1, 2, 8, 17),
            BoundingBox::new(15, 3, 22, 18),
            BoundingBox::new(30, 4, 37, 19),
        ];
        let sheet = sheet_with_blocks(40, 20, &blocks);
        let config = ExtractionConfig {
            segmentation: Segmentation::AxisClusters(ClusterConfig {
                count: 3,
                ..ClusterConfig::default()
            }),
            normalize: NormalizeConfig::pixel_art(16, 24),
            cluster_seed: Some(17),
        };

        let pipeline = SpritePipeline::new(config);
        let first = pipeline.segment(&sheet).unwrap();
        let second = pipeline.segment(&sheet).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, blocks.to_vec());
    }

    #[test]
    fn config_deserializes_from_toml() {
        let config: ExtractionConfig = toml::from_str(
            r#"
            cluster_seed = 5

            [segmentation.axis_clusters]
            count = 4
            alpha_threshold = 150

            [normalize]
            frame_width = 32
            frame_height = 48
            footprint_width = 32
            footprint_height = 48
            filter = "nearest"
            rounding = "nearest"
            "#,
        )
        .unwrap();

        assert_eq!(config.cluster_seed, Some(5));
        match config.segmentation {
            Segmentation::AxisClusters(cluster) => {
                assert_eq!(cluster.count, 4);
                assert_eq!(cluster.alpha_threshold, AlphaThreshold(150));
                assert_eq!(cluster.max_iterations, 25);
            }
            other => panic!("unexpected segmentation: {other:?}"),
        }
        assert_eq!(config.atlas_layout(), AtlasLayout::new(32, 48));
    }
}
