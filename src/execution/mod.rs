//! Execution module.
//!
//! This module runs resolved plans over scene tensors: the worker pool, the
//! per-plane engine, channel dispatch, stitching and the pipeline runner.

pub mod pool;
pub mod engine;
pub mod progress;
pub mod dispatcher;
pub mod stitcher;
pub mod post;
pub mod pipeline;

pub use pool::WorkerPool;
pub use engine::{apply_chain, TileEngine, WorkItem};
pub use progress::{ProgressCallback, ProgressTracker, ProgressUpdate, SkipReason};
pub use dispatcher::{DispatchStats, TensorDispatcher};
pub use stitcher::{montage, MosaicStitcher};
pub use post::PostStitchProcessor;
pub use pipeline::{Pipeline, PipelineOutput, PipelineStats, RunPlan};
