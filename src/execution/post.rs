//! Processing of stitched mosaics.

use crate::core::channels::ChannelMap;
use crate::core::error::{PipelineResult, ShapeError};
use crate::core::tensor::SceneTensor;
use crate::core::types::PipelineStage;
use crate::execution::dispatcher::{DispatchStats, TensorDispatcher};
use crate::execution::engine::TileEngine;
use crate::execution::progress::ProgressTracker;
use crate::filters::operation::OpChain;
use crate::plan::resolver::{resolve_uniform_plan, ChannelPlan};

/// Applies chains to tile-collapsed `(T, C, 1, Y, X)` scenes.
#[derive(Debug, Clone, Copy)]
pub struct PostStitchProcessor {
    dispatcher: TensorDispatcher,
}

impl PostStitchProcessor {
    /// Create a processor backed by `engine`.
    pub fn new(engine: TileEngine) -> Self {
        Self {
            dispatcher: TensorDispatcher::new(engine).for_stage(PipelineStage::PostStitch),
        }
    }

    /// Apply `chain` to every channel of a stitched scene.
    pub fn process_stitched(&self, mosaic: &SceneTensor, chain: &OpChain) -> PipelineResult<SceneTensor> {
        let plan = resolve_uniform_plan(mosaic.shape().channels, chain);
        self.process_with_plan(mosaic, &plan)
    }

    /// Apply a per-channel plan to a stitched scene.
    pub fn process_with_plan(&self, mosaic: &SceneTensor, plan: &ChannelPlan) -> PipelineResult<SceneTensor> {
        self.process_observed(mosaic, plan, None, None)
            .map(|(scene, _)| scene)
    }

    /// Like [`process_with_plan`](Self::process_with_plan), with progress
    /// reporting and counters.
    pub fn process_observed(
        &self,
        mosaic: &SceneTensor,
        plan: &ChannelPlan,
        names: Option<&ChannelMap>,
        tracker: Option<&ProgressTracker>,
    ) -> PipelineResult<(SceneTensor, DispatchStats)> {
        let tiles = mosaic.shape().tiles;
        if tiles != 1 {
            return Err(ShapeError::NotStitched { tiles }.into());
        }
        self.dispatcher.process_observed(mosaic, plan, names, tracker)
    }
}
