//! Pipeline runner.
//!
//! Drives a scene through the four stages in a fixed order:
//! plan resolution, tile processing, stitching and post-stitch processing.
//! Every configuration problem is reported during plan resolution, before
//! any plane is touched.

use crate::core::channels::ChannelMap;
use crate::core::config::PipelineConfig;
use crate::core::error::{PipelineResult, ShapeError};
use crate::core::io::{SceneSink, SceneSource};
use crate::core::tensor::SceneTensor;
use crate::core::types::{PipelineStage, RunId};
use crate::execution::dispatcher::{DispatchStats, TensorDispatcher};
use crate::execution::engine::TileEngine;
use crate::execution::pool::WorkerPool;
use crate::execution::post::PostStitchProcessor;
use crate::execution::progress::{ProgressCallback, ProgressTracker, ProgressUpdate, SkipReason};
use crate::execution::stitcher::MosaicStitcher;
use crate::filters::operation::OpChain;
use crate::filters::registry::OperationRegistry;
use crate::plan::checks::{PlanContext, PlanValidator};
use crate::plan::resolver::{resolve_plan, resolve_uniform_plan, ChannelPlan};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything resolved from a configuration for one scene.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Per-channel chains for the tile stage.
    pub tiles: ChannelPlan,
    /// Stitcher, when a grid shape is configured.
    pub stitcher: Option<MosaicStitcher>,
    /// Chain applied to every mosaic channel, when configured.
    pub post_chain: Option<OpChain>,
}

/// Statistics from one run.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Run identifier.
    pub run_id: RunId,
    /// Wall time of every stage that ran, in stage order.
    pub stage_durations: IndexMap<PipelineStage, Duration>,
    /// Stages skipped by configuration.
    pub skipped_stages: Vec<(PipelineStage, SkipReason)>,
    /// Planes run through a channel chain.
    pub planes_processed: usize,
    /// Channel batches processed across stages.
    pub channels_processed: usize,
    /// Channels carried through without a chain.
    pub channels_passed_through: usize,
    /// Total wall time.
    pub total_duration: Duration,
}

impl PipelineStats {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            stage_durations: IndexMap::new(),
            skipped_stages: Vec::new(),
            planes_processed: 0,
            channels_processed: 0,
            channels_passed_through: 0,
            total_duration: Duration::ZERO,
        }
    }

    fn absorb(&mut self, dispatch: DispatchStats) {
        self.planes_processed += dispatch.planes_processed;
        self.channels_processed += dispatch.channels_processed;
        self.channels_passed_through += dispatch.channels_passed_through;
    }

    /// Whether a stage was skipped.
    pub fn was_skipped(&self, stage: PipelineStage) -> bool {
        self.skipped_stages.iter().any(|(s, _)| *s == stage)
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        format!(
            "Run {}: {} planes over {} channel batches, {} passed through, {:.2}s",
            self.run_id,
            self.planes_processed,
            self.channels_processed,
            self.channels_passed_through,
            self.total_duration.as_secs_f64()
        )
    }
}

/// Tensors produced by a run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Tile stage output, same shape as the input unless chains resize.
    pub tiles: SceneTensor,
    /// Stitched mosaics, when a grid shape is configured.
    pub mosaic: Option<SceneTensor>,
    /// Post-stitch output, when a stitch chain is configured.
    pub processed_mosaic: Option<SceneTensor>,
    /// Run statistics.
    pub stats: PipelineStats,
}

impl PipelineOutput {
    /// The last tensor produced.
    pub fn final_scene(&self) -> &SceneTensor {
        self.processed_mosaic
            .as_ref()
            .or(self.mosaic.as_ref())
            .unwrap_or(&self.tiles)
    }

    /// Produced tensors tagged with their stage, in stage order.
    pub fn stages(&self) -> Vec<(PipelineStage, &SceneTensor)> {
        let mut stages = vec![(PipelineStage::TileProcessing, &self.tiles)];
        if let Some(mosaic) = &self.mosaic {
            stages.push((PipelineStage::Stitching, mosaic));
        }
        if let Some(processed) = &self.processed_mosaic {
            stages.push((PipelineStage::PostStitch, processed));
        }
        stages
    }
}

/// A configured preprocessing pipeline.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    registry: Arc<OperationRegistry>,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl Pipeline {
    /// Create a pipeline using the built-in operations.
    ///
    /// Fails on out-of-range parameters.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(OperationRegistry::with_builtins()),
            progress_callback: None,
        })
    }

    /// Resolve operation names against a different registry.
    pub fn with_registry(mut self, registry: OperationRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Receive progress updates during runs.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        let callback: ProgressCallback = Box::new(callback);
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The operation registry.
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Validate the configuration against a scene and resolve every chain.
    ///
    /// `tiles` enables the grid check when the scene's tile count is known.
    pub fn plan(&self, channel_map: &ChannelMap, tiles: Option<usize>) -> PipelineResult<RunPlan> {
        let mut ctx = PlanContext::new(&self.config, channel_map, &self.registry);
        if let Some(tiles) = tiles {
            ctx = ctx.with_tiles(tiles);
        }
        let report = PlanValidator::default_checks().validate(&ctx);
        if !report.can_execute() {
            log::error!("{}", report.summary());
            for line in report.detailed_errors() {
                log::error!("  {}", line);
            }
        }
        for warning in report.into_result()? {
            log::warn!("{}", warning.message);
        }

        let params = &self.config.parameters;
        let tile_plan = resolve_plan(channel_map, &self.config.process_channels, &self.registry, params)?;
        let stitcher = MosaicStitcher::from_config(&self.config);
        let post_chain = if self.config.stitch_processing.is_empty() {
            None
        } else {
            Some(self.registry.resolve_chain(
                self.config.stitch_processing.as_slice(),
                params,
                "stitch_processing",
            )?)
        };

        Ok(RunPlan {
            tiles: tile_plan,
            stitcher,
            post_chain,
        })
    }

    /// Run every configured stage on `scene`.
    ///
    /// Outputs keep the scene's axis order.
    pub fn run(&self, scene: &SceneTensor, channel_map: &ChannelMap) -> PipelineResult<PipelineOutput> {
        let shape = scene.shape();
        if channel_map.len() != shape.channels {
            return Err(ShapeError::ChannelCount {
                expected: channel_map.len(),
                got: shape.channels,
            }
            .into());
        }

        let run_id = RunId::new();
        let start = Instant::now();
        let mut stats = PipelineStats::new(run_id);
        let mut tracker = ProgressTracker::new(self.expected_batches(shape.channels));
        if let Some(callback) = &self.progress_callback {
            tracker = tracker.with_callback(callback.clone());
        }
        tracker.start(run_id);
        log::info!("Run {} on scene {} ({})", run_id, shape, scene.order());

        let plan = self.stage(PipelineStage::PlanResolution, &tracker, &mut stats, || {
            self.plan(channel_map, Some(shape.tiles))
        })?;

        let engine = TileEngine::new(WorkerPool::new(self.config.parallel_procs));
        log::debug!("Worker pool size: {}", engine.pool().size());
        let tiles = if plan.tiles.is_empty() {
            self.skip(PipelineStage::TileProcessing, SkipReason::NoChannels, &tracker, &mut stats);
            scene.clone()
        } else {
            let dispatcher = TensorDispatcher::new(engine);
            let (tiles, dispatch) = self.stage(PipelineStage::TileProcessing, &tracker, &mut stats, || {
                dispatcher.process_observed(scene, &plan.tiles, Some(channel_map), Some(&tracker))
            })?;
            stats.absorb(dispatch);
            tiles
        };

        let mosaic = match plan.stitcher {
            Some(stitcher) => Some(self.stage(PipelineStage::Stitching, &tracker, &mut stats, || {
                stitcher.stitch(&tiles)
            })?),
            None => {
                self.skip(PipelineStage::Stitching, SkipReason::NoGrid, &tracker, &mut stats);
                self.skip(PipelineStage::PostStitch, SkipReason::NoGrid, &tracker, &mut stats);
                None
            }
        };

        let processed_mosaic = match (&mosaic, &plan.post_chain) {
            (Some(mosaic), Some(chain)) => {
                let post = PostStitchProcessor::new(engine);
                let post_plan = resolve_uniform_plan(shape.channels, chain);
                let (processed, dispatch) = self.stage(PipelineStage::PostStitch, &tracker, &mut stats, || {
                    post.process_observed(mosaic, &post_plan, Some(channel_map), Some(&tracker))
                })?;
                stats.absorb(dispatch);
                Some(processed)
            }
            (Some(_), None) => {
                self.skip(PipelineStage::PostStitch, SkipReason::EmptyChain, &tracker, &mut stats);
                None
            }
            (None, _) => None,
        };

        stats.total_duration = start.elapsed();
        tracker.complete();
        log::info!(
            "Finished run {} in {:.2} minutes",
            run_id,
            stats.total_duration.as_secs_f64() / 60.0
        );

        Ok(PipelineOutput {
            tiles,
            mosaic,
            processed_mosaic,
            stats,
        })
    }

    /// Read a scene from `source`, run, and hand every stage output to `sink`.
    pub fn run_with(&self, source: &dyn SceneSource, sink: &mut dyn SceneSink) -> PipelineResult<PipelineStats> {
        log::info!("Reading {}", source.describe());
        let scene = source.read_scene()?;
        let output = self.run(&scene, source.channel_map())?;
        for (stage, tensor) in output.stages() {
            sink.write(stage, tensor)?;
        }
        sink.finalize()?;
        Ok(output.stats)
    }

    /// Channel batches a run will process, for progress estimates.
    fn expected_batches(&self, channels: usize) -> usize {
        let post = if self.config.grid_shape.is_some() && !self.config.stitch_processing.is_empty() {
            channels
        } else {
            0
        };
        self.config.process_channels.len() + post
    }

    fn stage<T, F>(
        &self,
        stage: PipelineStage,
        tracker: &ProgressTracker,
        stats: &mut PipelineStats,
        f: F,
    ) -> PipelineResult<T>
    where
        F: FnOnce() -> PipelineResult<T>,
    {
        log::debug!("Stage {} started", stage);
        tracker.stage_started(stage);
        let started = Instant::now();
        match f() {
            Ok(value) => {
                let elapsed = started.elapsed();
                stats.stage_durations.insert(stage, elapsed);
                tracker.stage_completed(stage, elapsed.as_millis() as u64);
                Ok(value)
            }
            Err(err) => {
                log::error!("Stage {} failed: {}", stage, err);
                tracker.report_error(Some(stage), err.to_string());
                Err(err)
            }
        }
    }

    fn skip(
        &self,
        stage: PipelineStage,
        reason: SkipReason,
        tracker: &ProgressTracker,
        stats: &mut PipelineStats,
    ) {
        log::info!("Skipping {} ({:?})", stage, reason);
        stats.skipped_stages.push((stage, reason));
        tracker.stage_skipped(stage, reason);
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("operations", &self.registry.len())
            .field("progress_callback", &self.progress_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ConfigError, PipelineError};
    use crate::core::io::{MemorySceneSink, MemorySceneSource};
    use crate::core::tensor::{AxisOrder, Pixel, SceneShape};
    use std::sync::Mutex;

    fn scene(shape: SceneShape) -> SceneTensor {
        SceneTensor::from_fn(shape, AxisOrder::TCMYX, |t, c, m, y, x| {
            (t * 3 + c * 11 + m * 5) as Pixel + ((y * 7 + x * 3) % 23) as Pixel
        })
    }

    fn channels() -> ChannelMap {
        ChannelMap::from_names(["ch0", "ch1"]).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new()
            .with_channel("ch0", &["blur", "rescale"])
            .with_grid_shape(2, 2)
            .with_parallel_procs(2)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let input = scene(SceneShape::new(2, 2, 4, 50, 50));
        let output = Pipeline::new(config()).unwrap().run(&input, &channels()).unwrap();

        assert_eq!(output.tiles.shape(), SceneShape::new(2, 2, 4, 50, 50));
        for t in 0..2 {
            for m in 0..4 {
                assert_eq!(output.tiles.plane(t, 1, m), input.plane(t, 1, m));
            }
        }

        let mosaic = output.mosaic.as_ref().unwrap();
        assert_eq!(mosaic.shape(), SceneShape::new(2, 2, 1, 100, 100));
        for t in 0..2 {
            assert!(mosaic
                .plane(t, 0, 0)
                .iter()
                .all(|&v| (0.0..=1.0 + 1e-6).contains(&v)));
        }
        assert!(output.processed_mosaic.is_none());
        assert!(output.stats.was_skipped(PipelineStage::PostStitch));
        assert_eq!(output.stats.planes_processed, 8);
        assert_eq!(output.stats.channels_processed, 1);
        assert_eq!(output.stats.channels_passed_through, 1);
        assert_eq!(
            output.stats.stage_durations.keys().copied().collect::<Vec<_>>(),
            vec![
                PipelineStage::PlanResolution,
                PipelineStage::TileProcessing,
                PipelineStage::Stitching
            ]
        );
    }

    #[test]
    fn test_grid_mismatch_fails_before_processing() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let pipeline = Pipeline::new(config().with_grid_shape(3, 3))
            .unwrap()
            .with_progress(move |update| sink.lock().unwrap().push(update));

        let err = pipeline
            .run(&scene(SceneShape::new(1, 2, 4, 8, 8)), &channels())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::GridShapeMismatch { tiles: 4, .. })
        ));

        let events = events.lock().unwrap();
        assert!(!events
            .iter()
            .any(|e| matches!(e, ProgressUpdate::ChannelStarted { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressUpdate::Error {
                stage: Some(PipelineStage::PlanResolution),
                ..
            }
        )));
    }

    #[test]
    fn test_channel_count_mismatch() {
        let err = Pipeline::new(config())
            .unwrap()
            .run(&scene(SceneShape::new(1, 3, 4, 4, 4)), &channels())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Shape(ShapeError::ChannelCount { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_without_grid_skips_stitching() {
        let config = PipelineConfig::new().with_channel("ch1", &["gamma"]);
        let output = Pipeline::new(config)
            .unwrap()
            .run(&scene(SceneShape::new(1, 2, 3, 6, 6)), &channels())
            .unwrap();
        assert!(output.mosaic.is_none());
        assert!(output.stats.was_skipped(PipelineStage::Stitching));
        assert!(output.stats.was_skipped(PipelineStage::PostStitch));
        assert_eq!(output.final_scene(), &output.tiles);
    }

    #[test]
    fn test_no_channels_copies_through() {
        let input = scene(SceneShape::new(1, 2, 4, 4, 4));
        let output = Pipeline::new(PipelineConfig::new().with_grid_shape(2, 2))
            .unwrap()
            .run(&input, &channels())
            .unwrap();
        assert_eq!(output.tiles, input);
        assert!(output.stats.was_skipped(PipelineStage::TileProcessing));
        assert_eq!(output.mosaic.unwrap().shape(), SceneShape::new(1, 2, 1, 8, 8));
    }

    #[test]
    fn test_post_stitch_chain() {
        let config = config()
            .with_quilt_resize_factor(2)
            .with_stitch_processing(&["stretch"]);
        let output = Pipeline::new(config)
            .unwrap()
            .run(&scene(SceneShape::new(1, 2, 4, 10, 10)), &channels())
            .unwrap();

        let processed = output.processed_mosaic.as_ref().unwrap();
        assert_eq!(processed.shape(), SceneShape::new(1, 2, 1, 10, 10));
        assert!(processed.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(output.final_scene(), processed);
        assert_eq!(output.stats.channels_processed, 3);
    }

    #[test]
    fn test_unknown_stitch_operation() {
        let err = Pipeline::new(config().with_stitch_processing(&["sharpen"]))
            .unwrap()
            .plan(&channels(), Some(4))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::UnknownOperation { ref name, .. }) if name == "sharpen"
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Pipeline::new(config().with_quilt_resize_factor(0)).is_err());
    }

    #[test]
    fn test_channel_major_input_keeps_order() {
        let input = scene(SceneShape::new(1, 2, 4, 6, 6)).to_order(AxisOrder::CTMYX);
        let output = Pipeline::new(config()).unwrap().run(&input, &channels()).unwrap();
        assert_eq!(output.tiles.order(), AxisOrder::CTMYX);
        assert_eq!(output.mosaic.unwrap().order(), AxisOrder::CTMYX);
    }

    #[test]
    fn test_run_with_source_and_sink() {
        let source = MemorySceneSource::new(scene(SceneShape::new(1, 2, 4, 8, 8)), channels());
        let mut sink = MemorySceneSink::new();
        let stats = Pipeline::new(config().with_stitch_processing(&["rescale"]))
            .unwrap()
            .run_with(&source, &mut sink)
            .unwrap();

        assert_eq!(
            sink.stages(),
            vec![
                PipelineStage::TileProcessing,
                PipelineStage::Stitching,
                PipelineStage::PostStitch
            ]
        );
        assert!(sink.is_finalized());
        assert!(stats.skipped_stages.is_empty());
        assert_eq!(
            sink.get(PipelineStage::PostStitch).unwrap().shape(),
            SceneShape::new(1, 2, 1, 16, 16)
        );
    }
}
