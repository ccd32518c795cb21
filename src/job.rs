// THEORY:
// A job file is how asset builds drive the engine without writing Rust. Each
// `[[sheet]]` entry names one composite source, the extraction settings for it,
// and where the normalized result goes:
//
// - `frames`: one PNG per normalized frame (e.g. NPC variant pools),
// - `pack`:   a fresh atlas, frames split into rows at given indices,
// - `merge`:  those rows spliced into an existing, larger sprite sheet.
//
// This layer is thin I/O around `ParallelPipeline` and
// `AtlasLayout`. It does not create directories or check that inputs exist;
// those are the caller's preconditions, and any failure simply surfaces as an
// error that halts the run.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::frame_normalizer::NormalizedFrame;
use crate::error::{Result, SpriteError};
use crate::parallel_pipeline::ParallelPipeline;
use crate::pipeline::{ComposedSheet, ExtractionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The top-level contents of a job file.
#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    #[serde(rename = "sheet", default)]
    pub sheets: Vec<SheetJob>,
}

/// One composite sheet to process.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetJob {
    pub name: String,
    pub source: PathBuf,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub output: OutputLayout,
    /// Optional JSON summary of where every frame went.
    #[serde(default)]
    pub summary: Option<PathBuf>,
}

/// Where normalized frames are written.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum OutputLayout {
    /// `<directory>/<prefix>-NN.png`, numbered from 01.
    Frames { directory: PathBuf, prefix: String },
    /// A new atlas with one row per frame group.
    Pack {
        path: PathBuf,
        #[serde(default)]
        split_at: Vec<usize>,
    },
    /// Frame groups written into `target_rows` of an existing sheet.
    Merge {
        base: PathBuf,
        path: PathBuf,
        #[serde(default)]
        split_at: Vec<usize>,
        target_rows: Vec<u32>,
    },
}

/// Record of one frame in a job summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    pub bounds: BoundingBox,
    pub scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub name: String,
    pub source: PathBuf,
    pub strategy: String,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Atlas grid size, for `pack` and `merge` layouts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_rows: Vec<u32>,
    pub outputs: Vec<PathBuf>,
    pub frames: Vec<FrameRecord>,
}

/// Reads and parses a TOML job file.
pub fn load_job_file(path: &Path) -> Result<JobFile> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// Cuts `frames` into consecutive groups at the given ascending indices.
pub fn split_rows<'a>(frames: &'a [NormalizedFrame], split_at: &[usize]) -> Result<Vec<&'a [NormalizedFrame]>> {
    let mut groups = Vec::with_capacity(split_at.len() + 1);
    let mut start = 0;
    for &end in split_at {
        if end < start || end > frames.len() {
            return Err(SpriteError::InvalidLayout(format!(
                "split index {end} out of order or past {} frames",
                frames.len()
            )));
        }
        groups.push(&frames[start..end]);
        start = end;
    }
    groups.push(&frames[start..]);
    Ok(groups)
}

/// Runs one sheet job. Relative paths resolve against `base_dir`.
///
/// Must be called inside a tokio runtime.
pub async fn run_job(job: &SheetJob, base_dir: &Path) -> Result<JobSummary> {
    let source_path = base_dir.join(&job.source);
    let source = Arc::new(image::open(&source_path)?.to_rgba8());

    let pipeline = ParallelPipeline::new(job.extraction.clone());
    let frames = pipeline.extract(Arc::clone(&source)).await?;
    let normalize = &job.extraction.normalize;

    let mut summary = JobSummary {
        name: job.name.clone(),
        source: job.source.clone(),
        strategy: job.extraction.segmentation.name().to_string(),
        frame_width: normalize.frame_width,
        frame_height: normalize.frame_height,
        columns: None,
        rows: None,
        target_rows: Vec::new(),
        outputs: Vec::new(),
        frames: Vec::new(),
    };

    match &job.output {
        OutputLayout::Frames { directory, prefix } => {
            for (index, frame) in frames.iter().enumerate() {
                let relative = directory.join(format!("{prefix}-{:02}.png", index + 1));
                frame.image.save(base_dir.join(&relative))?;
                summary.frames.push(FrameRecord {
                    bounds: frame.source_bounds,
                    scale: frame.scale,
                    column: None,
                    row: None,
                    path: Some(relative.clone()),
                });
                summary.outputs.push(relative);
            }
        }
        OutputLayout::Pack { path, split_at } => {
            let groups = split_rows(&frames, split_at)?;
            let sheet = job.extraction.atlas_layout().pack(&groups)?;
            sheet.image.save(base_dir.join(path))?;
            record_placements(&mut summary, &sheet, &frames);
            summary.outputs.push(path.clone());
        }
        OutputLayout::Merge {
            base,
            path,
            split_at,
            target_rows,
        } => {
            let groups = split_rows(&frames, split_at)?;
            if groups.len() != target_rows.len() {
                return Err(SpriteError::InvalidLayout(format!(
                    "{} frame groups but {} target rows",
                    groups.len(),
                    target_rows.len()
                )));
            }
            let base_sheet = image::open(base_dir.join(base))?.to_rgba8();
            let rows: Vec<(u32, &[NormalizedFrame])> = target_rows.iter().copied().zip(groups).collect();
            let sheet = job.extraction.atlas_layout().merge(&base_sheet, &rows)?;
            sheet.image.save(base_dir.join(path))?;
            record_placements(&mut summary, &sheet, &frames);
            summary.target_rows = target_rows.clone();
            summary.outputs.push(path.clone());
        }
    }

    if let Some(summary_path) = &job.summary {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(base_dir.join(summary_path), json + "\n")?;
    }

    tracing::info!(
        job = %job.name,
        frames = summary.frames.len(),
        outputs = summary.outputs.len(),
        "sheet job complete"
    );
    Ok(summary)
}

fn record_placements(summary: &mut JobSummary, sheet: &ComposedSheet, frames: &[NormalizedFrame]) {
    summary.columns = Some(sheet.columns);
    summary.rows = Some(sheet.rows);
    // Placements come out in the same order the frames went in.
    for (placement, frame) in sheet.placements.iter().zip(frames) {
        summary.frames.push(FrameRecord {
            bounds: placement.source,
            scale: frame.scale,
            column: Some(placement.column),
            row: Some(placement.row),
            path: None,
        });
    }
}
