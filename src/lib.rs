// THEORY:
// This file is the main entry point for the `sprite_forge` library crate.
// It exposes the extraction engine to thin callers (the `sprite_forge` runner,
// or any asset build script) that load a composite sheet, pick a segmentation
// strategy, and persist the resulting frames and atlases.
//
// The primary interface is `SpritePipeline` (sequential) and `ParallelPipeline`
// (worker-pool normalization) together with `ExtractionConfig`. The algorithms
// themselves live in `core_modules`, leaf-first: pixel evidence, bounding boxes,
// the two segmenters, the frame normalizer, and the atlas composer.

pub mod core_modules;
pub mod error;
pub mod job;
pub mod parallel_pipeline;
pub mod pipeline;

pub use error::{Result, SpriteError};
