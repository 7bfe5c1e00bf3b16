//! Channel-wise dispatch of a scene tensor through a [`ChannelPlan`].
//!
//! The scene is viewed channel-major, every channel's (time, tile) planes are
//! handed to the [`TileEngine`] as one batch, and the results are written back
//! at the positions they came from. The output keeps the input's axis order.

use crate::core::channels::ChannelMap;
use crate::core::error::{PipelineResult, ShapeError};
use crate::core::tensor::{AxisOrder, Pixel, Plane, SceneTensor};
use crate::core::types::{PipelineStage, PlaneCoord};
use crate::execution::engine::{TileEngine, WorkItem};
use crate::execution::progress::ProgressTracker;
use crate::filters::operation::OpChain;
use crate::plan::resolver::ChannelPlan;
use ndarray::{s, Array5, ArrayView4, Axis};
use std::time::Instant;

/// Counters collected while dispatching one tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Planes run through a non-passthrough chain.
    pub planes_processed: usize,
    /// Channels with a chain of their own.
    pub channels_processed: usize,
    /// Channels carried through unchanged or resize-only.
    pub channels_passed_through: usize,
}

impl DispatchStats {
    /// Add another set of counters into this one.
    pub fn merge(&mut self, other: DispatchStats) {
        self.planes_processed += other.planes_processed;
        self.channels_processed += other.channels_processed;
        self.channels_passed_through += other.channels_passed_through;
    }
}

/// Runs a [`ChannelPlan`] over a whole scene.
#[derive(Debug, Clone, Copy)]
pub struct TensorDispatcher {
    engine: TileEngine,
    stage: PipelineStage,
}

impl TensorDispatcher {
    /// Create a dispatcher for the tile processing stage.
    pub fn new(engine: TileEngine) -> Self {
        Self {
            engine,
            stage: PipelineStage::TileProcessing,
        }
    }

    /// Tag progress events and plane coordinates with a different stage.
    pub fn for_stage(mut self, stage: PipelineStage) -> Self {
        self.stage = stage;
        self
    }

    /// Stage this dispatcher reports as.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Process every channel of `scene` according to `plan`.
    pub fn process(&self, scene: &SceneTensor, plan: &ChannelPlan) -> PipelineResult<SceneTensor> {
        self.process_observed(scene, plan, None, None)
            .map(|(scene, _)| scene)
    }

    /// Like [`process`](Self::process), also reporting to a progress tracker
    /// and returning dispatch counters.
    ///
    /// Channels are processed one at a time in index order; the planes of a
    /// channel are processed in parallel. `names` is only used for log lines
    /// and progress events.
    pub fn process_observed(
        &self,
        scene: &SceneTensor,
        plan: &ChannelPlan,
        names: Option<&ChannelMap>,
        tracker: Option<&ProgressTracker>,
    ) -> PipelineResult<(SceneTensor, DispatchStats)> {
        let original = scene.order();
        let shape = scene.shape();
        let view = scene.view_as(AxisOrder::CTMYX);
        let extent = plan.output_extent((shape.height, shape.width))?;

        let mut out = Array5::<Pixel>::zeros((shape.channels, shape.time, shape.tiles, extent.0, extent.1));
        let mut stats = DispatchStats::default();

        for channel in 0..shape.channels {
            let planes = view.index_axis(Axis(0), channel);
            match plan.get(channel) {
                Some(chain) => {
                    let name = names
                        .map(|n| n.display_name(channel))
                        .unwrap_or_else(|| format!("#{}", channel));
                    log::info!("processing: {}", name);
                    let started = Instant::now();
                    let count = shape.time * shape.tiles;
                    if let Some(tracker) = tracker {
                        tracker.channel_started(self.stage, channel, name, count);
                    }

                    let results = self.run_chain(channel, &planes, chain)?;
                    reassemble(&mut out, channel, shape.tiles, results, extent)?;

                    stats.planes_processed += count;
                    stats.channels_processed += 1;
                    if let Some(tracker) = tracker {
                        tracker.channel_completed(self.stage, channel, started.elapsed().as_millis() as u64);
                    }
                }
                None => {
                    let passthrough = plan.passthrough_chain();
                    if passthrough.is_empty() {
                        out.index_axis_mut(Axis(0), channel).assign(&planes);
                    } else {
                        log::debug!("Resizing passthrough channel {} with {}", channel, passthrough);
                        let results = self.run_chain(channel, &planes, passthrough)?;
                        reassemble(&mut out, channel, shape.tiles, results, extent)?;
                    }
                    stats.channels_passed_through += 1;
                    if let Some(tracker) = tracker {
                        tracker.channel_passed_through(self.stage, channel);
                    }
                }
            }
        }

        let processed = SceneTensor::new(out, AxisOrder::CTMYX).to_order(original);
        Ok((processed, stats))
    }

    fn run_chain(
        &self,
        channel: usize,
        planes: &ArrayView4<'_, Pixel>,
        chain: &OpChain,
    ) -> PipelineResult<Vec<Plane>> {
        let (time, tiles, _, _) = planes.dim();
        let mut items = Vec::with_capacity(time * tiles);
        for t in 0..time {
            for m in 0..tiles {
                let coord = match self.stage {
                    PipelineStage::PostStitch => PlaneCoord::stitched(t),
                    _ => PlaneCoord::tile(t, m),
                };
                let plane = planes.slice(s![t, m, .., ..]).to_owned();
                items.push(WorkItem::new(t * tiles + m, coord, plane));
            }
        }
        self.engine.process_channel_planes(channel, items, chain)
    }
}

/// Write processed planes back at `(channel, index / tiles, index % tiles)`.
fn reassemble(
    out: &mut Array5<Pixel>,
    channel: usize,
    tiles: usize,
    results: Vec<Plane>,
    expected: (usize, usize),
) -> Result<(), ShapeError> {
    for (index, plane) in results.into_iter().enumerate() {
        if plane.dim() != expected {
            return Err(ShapeError::Reassembly {
                channel,
                index,
                expected,
                got: plane.dim(),
            });
        }
        out.slice_mut(s![channel, index / tiles, index % tiles, .., ..])
            .assign(&plane);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{OperationError, PipelineError};
    use crate::core::tensor::SceneShape;
    use crate::execution::engine::apply_chain;
    use crate::execution::pool::WorkerPool;
    use crate::execution::progress::{ProgressCallback, ProgressUpdate};
    use crate::filters::builtin::resize::area_downscale;
    use crate::filters::operation::Operation;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    fn scene(shape: SceneShape) -> SceneTensor {
        SceneTensor::from_fn(shape, AxisOrder::TCMYX, |t, c, m, y, x| {
            1.0 + (t * 7 + c * 5 + m * 3) as Pixel + ((y * 13 + x * 11) % 17) as Pixel
        })
    }

    fn plan(entries: Vec<(usize, Vec<Operation>)>) -> ChannelPlan {
        let chains: BTreeMap<usize, OpChain> = entries
            .into_iter()
            .map(|(c, ops)| (c, OpChain::new(ops)))
            .collect();
        ChannelPlan::from_chains(chains, |c| c.to_string()).unwrap()
    }

    fn dispatcher() -> TensorDispatcher {
        TensorDispatcher::new(TileEngine::new(WorkerPool::new(3)))
    }

    #[test]
    fn test_unlisted_channels_are_bit_identical() {
        let input = scene(SceneShape::new(2, 3, 2, 8, 8));
        let plan = plan(vec![(0, vec![Operation::Rescale { range: (0.0, 1.0) }])]);
        let out = dispatcher().process(&input, &plan).unwrap();

        assert_eq!(out.order(), AxisOrder::TCMYX);
        assert_eq!(out.shape(), input.shape());
        for t in 0..2 {
            for m in 0..2 {
                assert_eq!(out.plane(t, 1, m), input.plane(t, 1, m));
                assert_eq!(out.plane(t, 2, m), input.plane(t, 2, m));
                let max = out.plane(t, 0, m).fold(f32::MIN, |a, &b| a.max(b));
                assert!((max - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_planes_return_to_their_positions() {
        let input = scene(SceneShape::new(3, 2, 4, 6, 5));
        let ops = vec![
            Operation::GaussianBlur { sigma: 0.8 },
            Operation::Gamma { gamma: 2.0 },
        ];
        let chain = OpChain::new(ops.clone());
        let out = dispatcher()
            .process(&input, &plan(vec![(1, ops)]))
            .unwrap();

        for t in 0..3 {
            for m in 0..4 {
                let expected = apply_chain(input.plane(t, 1, m).to_owned(), &chain).unwrap();
                assert_eq!(out.plane(t, 1, m), expected);
            }
        }
    }

    #[test]
    fn test_preserves_channel_major_order() {
        let input = scene(SceneShape::new(2, 2, 3, 4, 4)).to_order(AxisOrder::CTMYX);
        let plan = plan(vec![(1, Vec::new())]);
        let out = dispatcher().process(&input, &plan).unwrap();
        assert_eq!(out.order(), AxisOrder::CTMYX);
        assert_eq!(out, input);
    }

    #[test]
    fn test_passthrough_channels_follow_resize() {
        let input = scene(SceneShape::new(1, 2, 2, 8, 6));
        let plan = plan(vec![(
            0,
            vec![Operation::GaussianBlur { sigma: 1.0 }, Operation::Resize { factor: 2 }],
        )]);
        let out = dispatcher().process(&input, &plan).unwrap();

        assert_eq!(out.shape(), SceneShape::new(1, 2, 2, 4, 3));
        for m in 0..2 {
            let expected = area_downscale(&input.plane(0, 1, m).to_owned(), 2).unwrap();
            assert_eq!(out.plane(0, 1, m), expected);
        }
    }

    #[test]
    fn test_failure_reports_channel_and_position() {
        let mut data = scene(SceneShape::new(2, 2, 3, 4, 4)).into_data();
        data[[1, 1, 2, 0, 0]] = -3.0;
        let input = SceneTensor::new(data, AxisOrder::TCMYX);
        let plan = plan(vec![(1, vec![Operation::LogCorrection { gain: 1.0 }])]);

        match dispatcher().process(&input, &plan).unwrap_err() {
            PipelineError::Plane(e) => {
                assert_eq!(e.channel, 1);
                assert_eq!(e.index, 5);
                assert_eq!(e.coord, PlaneCoord::tile(1, 2));
                assert!(matches!(e.source, OperationError::NegativeIntensity { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }

        let post = dispatcher().for_stage(PipelineStage::PostStitch);
        match post.process(&input, &plan).unwrap_err() {
            PipelineError::Plane(e) => assert_eq!(e.coord, PlaneCoord::stitched(1)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_observed_stats_and_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: ProgressCallback = Box::new(move |update| {
            sink.lock().unwrap().push(update);
        });
        let tracker = ProgressTracker::new(1).with_callback(Arc::new(callback));
        let names = ChannelMap::from_names(["dapi", "gfp"]).unwrap();
        let input = scene(SceneShape::new(2, 2, 2, 4, 4));
        let plan = plan(vec![(1, vec![Operation::Stretch { percentiles: (1.0, 99.0) }])]);

        let (_, stats) = dispatcher()
            .process_observed(&input, &plan, Some(&names), Some(&tracker))
            .unwrap();

        assert_eq!(
            stats,
            DispatchStats {
                planes_processed: 4,
                channels_processed: 1,
                channels_passed_through: 1,
            }
        );
        let events = events.lock().unwrap();
        assert!(matches!(events[0], ProgressUpdate::ChannelPassedThrough { channel: 0, .. }));
        assert!(matches!(
            &events[1],
            ProgressUpdate::ChannelStarted { channel: 1, name, planes: 4, .. } if name == "gfp"
        ));
        assert!(matches!(events[2], ProgressUpdate::ChannelCompleted { channel: 1, .. }));
        assert_eq!(tracker.progress_percent(), 100.0);
    }

    #[test]
    fn test_empty_plan_copies_scene() {
        let input = scene(SceneShape::new(1, 2, 1, 3, 3));
        let out = dispatcher().process(&input, &ChannelPlan::empty()).unwrap();
        assert_eq!(out, input);
    }
}
