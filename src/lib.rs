//! # Quiltpipe - Tiled Microscopy Preprocessing
//!
//! Quiltpipe applies per-channel chains of pixel operations to every
//! (time, tile) plane of a 5-D microscopy scene, stitches tile grids into
//! mosaics and optionally processes the mosaics again.
//!
//! ## Features
//!
//! - **Per-channel chains**: each channel gets its own ordered list of operations
//! - **Parallel planes**: a bounded worker pool processes one channel's planes at a time
//! - **Stitching**: row-major tile grids become one contiguous mosaic per (time, channel)
//! - **Eager validation**: every configuration problem surfaces before any plane is processed
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quiltpipe::prelude::*;
//!
//! let config = PipelineConfig::new()
//!     .with_channel("dapi", &["ball", "blur", "rescale"])
//!     .with_grid_shape(3, 3)
//!     .with_stitch_processing(&["stretch"]);
//!
//! let channels = ChannelMap::from_names(["dapi", "gfp"])?;
//! let scene = SceneTensor::zeros(SceneShape::new(2, 2, 9, 512, 512), AxisOrder::TCMYX);
//!
//! let output = Pipeline::new(config)?.run(&scene, &channels)?;
//! println!("{}", output.stats.summary());
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Scene tensors, channel metadata, configuration and errors
//! - [`filters`]: Operation registry and the built-in pixel operations
//! - [`plan`]: Channel plan resolution and configuration checks
//! - [`execution`]: Worker pool, dispatch, stitching and the pipeline runner

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod filters;
pub mod plan;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use quiltpipe::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{GridShape, PipelineStage, PlaneCoord, RunId};
    pub use crate::core::tensor::{AxisOrder, Dim, Pixel, Plane, SceneShape, SceneTensor};
    pub use crate::core::channels::ChannelMap;
    pub use crate::core::config::{OperationParameters, PipelineConfig, SeedLevel};
    pub use crate::core::io::{MemorySceneSink, MemorySceneSource, SceneSink, SceneSource};

    // Errors
    pub use crate::core::error::{
        ConfigError, OperationError, PipelineError, PipelineResult, PlaneProcessingError,
        ShapeError, ValidationReport, ValidationWarning,
    };

    // Operations
    pub use crate::filters::operation::{OpChain, Operation, OperationKind};
    pub use crate::filters::registry::{
        Category, OperationDescriptor, OperationRegistry, RegistryBuilder, RegistryEntry,
    };

    // Planning
    pub use crate::plan::checks::{PlanCheck, PlanContext, PlanValidator};
    pub use crate::plan::resolver::{resolve_plan, resolve_uniform_plan, ChannelPlan};

    // Execution
    pub use crate::execution::dispatcher::{DispatchStats, TensorDispatcher};
    pub use crate::execution::engine::{TileEngine, WorkItem};
    pub use crate::execution::pipeline::{Pipeline, PipelineOutput, PipelineStats, RunPlan};
    pub use crate::execution::pool::WorkerPool;
    pub use crate::execution::post::PostStitchProcessor;
    pub use crate::execution::progress::{ProgressCallback, ProgressTracker, ProgressUpdate, SkipReason};
    pub use crate::execution::stitcher::MosaicStitcher;
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "quiltpipe");
    }

    #[test]
    fn test_prelude_pipeline() {
        let config = PipelineConfig::new()
            .with_channel("gfp", &["ball", "blur", "stretch"])
            .with_grid_shape(1, 2)
            .with_parallel_procs(2);
        let channels = ChannelMap::from_names(["dapi", "gfp"]).unwrap();
        let scene = SceneTensor::from_fn(
            SceneShape::new(1, 2, 2, 16, 16),
            AxisOrder::TCMYX,
            |_, c, m, y, x| (c + m) as Pixel + ((x * y) % 5) as Pixel,
        );

        let output = Pipeline::new(config).unwrap().run(&scene, &channels).unwrap();
        assert_eq!(output.final_scene().shape(), SceneShape::new(1, 2, 1, 16, 32));
        assert_eq!(output.stats.stage_durations.len(), 3);
    }
}
