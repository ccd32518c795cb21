// THEORY:
// Every failure in the extraction engine is local and synchronous. A segmenter,
// normalizer, or composer either produces a complete, ordered result or returns
// one of these errors to the caller. Nothing is retried or swallowed: the
// variants carry the expected vs. actual counts (or the offending box) so a
// failed asset run can be diagnosed from the message alone.

use crate::core_modules::bounding_box::BoundingBox;

/// Error type for sprite extraction, normalization, and composition.
#[derive(Debug, thiserror::Error)]
pub enum SpriteError {
    /// Fewer opaque pixels than the requested number of clusters.
    #[error("not enough opaque pixels to form {required} clusters (found {found})")]
    InsufficientEvidence { required: usize, found: usize },

    /// Clustering finished with empty clusters.
    #[error("expected {expected} clusters, found {found}")]
    ClusterCountMismatch { expected: usize, found: usize },

    /// Connected-component discovery disagreed with the caller's count.
    #[error("expected {expected} sprite components, found {found}")]
    ComponentCountMismatch { expected: usize, found: usize },

    /// A crop could not be scaled into the target footprint.
    #[error("degenerate scale {scale} for region {bounds}")]
    DegenerateScale { bounds: BoundingBox, scale: f64 },

    /// A frame handed to the atlas does not match the cell size.
    #[error("frame is {found_width}x{found_height}, atlas cells are {cell_width}x{cell_height}")]
    FrameSizeMismatch {
        cell_width: u32,
        cell_height: u32,
        found_width: u32,
        found_height: u32,
    },

    /// A job asked for a row split or merge the frames cannot satisfy.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// The normalization worker pool stopped accepting or answering tasks.
    #[error("normalization worker unavailable")]
    WorkerUnavailable,

    /// Image decode or encode error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Placement summary could not be serialized.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SpriteError>;
