// THEORY:
// Normalizing a large sheet means dozens of independent crop/resample/paste
// jobs against the same read-only source. This module fans those jobs out to a
// small pool of tokio workers while keeping the sequential pipeline's contract:
// the output order is the input box order, and the first failing box (in box
// order, not completion order) is the error the caller sees.
//
// Layout mirrors a classic dispatcher/worker pool:
// - one dispatcher task receives every task and deals them round-robin,
// - each worker owns its receiver and answers through a `oneshot` channel,
// - the source sheet is shared as an `Arc<RgbaImage>` and never copied.
//
// Segmentation itself stays sequential; only normalization is parallel.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::frame_normalizer::{NormalizeConfig, NormalizedFrame, normalize_frame};
use crate::error::{Result, SpriteError};
use crate::pipeline::{ExtractionConfig, SpritePipeline};
use image::RgbaImage;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub struct NormalizeTask {
    pub source: Arc<RgbaImage>,
    pub bounds: BoundingBox,
    pub result_sender: oneshot::Sender<Result<NormalizedFrame>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<NormalizeTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the dispatcher and `size` workers. Must be called inside a tokio runtime.
    pub fn new(config: NormalizeConfig, size: usize) -> Self {
        let size = size.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<NormalizeTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..size)
            .map(|_| mpsc::unbounded_channel::<NormalizeTask>())
            .unzip();

        // Dispatcher
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    tracing::warn!(worker = worker_idx, "normalization worker exited early");
                }
                worker_idx = (worker_idx + 1) % size;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .map(move |mut worker_receiver| {
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let frame = normalize_frame(&task.source, &task.bounds, &config);
                        let _ = task.result_sender.send(frame);
                    }
                })
            })
            .collect();

        Self {
            task_sender,
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues one box and waits for its frame.
    pub async fn normalize(&self, source: Arc<RgbaImage>, bounds: BoundingBox) -> Result<NormalizedFrame> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.task_sender
            .send(NormalizeTask {
                source,
                bounds,
                result_sender,
            })
            .map_err(|_| SpriteError::WorkerUnavailable)?;

        result_receiver
            .await
            .map_err(|_| SpriteError::WorkerUnavailable)?
    }
}

/// Normalizes many boxes of one sheet concurrently, keeping input order.
pub struct ParallelNormalizer {
    pool: WorkerPool,
}

impl ParallelNormalizer {
    /// One worker per logical CPU.
    pub fn new(config: NormalizeConfig) -> Self {
        Self::with_workers(config, num_cpus::get())
    }

    pub fn with_workers(config: NormalizeConfig, workers: usize) -> Self {
        Self {
            pool: WorkerPool::new(config, workers),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    pub async fn normalize_all(&self, source: Arc<RgbaImage>, boxes: &[BoundingBox]) -> Result<Vec<NormalizedFrame>> {
        let pending = boxes
            .iter()
            .map(|bounds| self.pool.normalize(Arc::clone(&source), *bounds));
        let frames = futures::future::join_all(pending).await;
        tracing::debug!(frames = frames.len(), workers = self.worker_count(), "parallel normalization done");
        frames.into_iter().collect()
    }
}

/// `SpritePipeline` with the normalization stage spread over a worker pool.
pub struct ParallelPipeline {
    pipeline: SpritePipeline,
    normalizer: ParallelNormalizer,
}

impl ParallelPipeline {
    /// Must be called inside a tokio runtime.
    pub fn new(config: ExtractionConfig) -> Self {
        let normalizer = ParallelNormalizer::new(config.normalize);
        Self {
            pipeline: SpritePipeline::new(config),
            normalizer,
        }
    }

    pub fn pipeline(&self) -> &SpritePipeline {
        &self.pipeline
    }

    pub async fn extract(&self, image: Arc<RgbaImage>) -> Result<Vec<NormalizedFrame>> {
        let boxes = self.pipeline.segment(&image)?;
        self.normalizer.normalize_all(image, &boxes).await
    }
}
