//! Tile processing engine.
//!
//! Applies operation chains to single planes and to whole channel batches.
//! Batches run on a [`WorkerPool`]; results come back in submission order so
//! callers can put each plane back at its tensor position by index.

use crate::core::error::{OperationError, PipelineResult, PlaneProcessingError};
use crate::core::tensor::Plane;
use crate::core::types::PlaneCoord;
use crate::execution::pool::WorkerPool;
use crate::filters::operation::OpChain;

/// One plane plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Position in the submitted work list.
    pub index: usize,
    /// Originating (time, tile) coordinate.
    pub coord: PlaneCoord,
    /// The plane itself.
    pub plane: Plane,
}

impl WorkItem {
    /// Create a work item.
    pub fn new(index: usize, coord: PlaneCoord, plane: Plane) -> Self {
        Self {
            index,
            coord,
            plane,
        }
    }
}

/// Fold `chain` over `plane`, left to right.
///
/// The empty chain returns the plane unchanged.
pub fn apply_chain(plane: Plane, chain: &OpChain) -> Result<Plane, OperationError> {
    chain.iter().try_fold(plane, |plane, op| op.apply(&plane))
}

/// Applies chains to planes, in parallel across one channel's planes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileEngine {
    pool: WorkerPool,
}

impl TileEngine {
    /// Create an engine backed by `pool`.
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }

    /// The engine's worker pool.
    pub fn pool(&self) -> WorkerPool {
        self.pool
    }

    /// Apply a chain to one plane.
    pub fn apply_chain(&self, plane: Plane, chain: &OpChain) -> Result<Plane, OperationError> {
        apply_chain(plane, chain)
    }

    /// Apply the same chain to every plane of one channel.
    ///
    /// Output position `i` holds the result for input position `i`. The first
    /// failing plane aborts the batch with a [`PlaneProcessingError`] naming
    /// the channel and the plane's position.
    pub fn process_channel_planes(
        &self,
        channel: usize,
        items: Vec<WorkItem>,
        chain: &OpChain,
    ) -> PipelineResult<Vec<Plane>> {
        self.pool.map_ordered(items, |item| {
            apply_chain(item.plane, chain).map_err(|source| PlaneProcessingError {
                channel,
                index: item.index,
                coord: item.coord,
                source,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{OperationError, PipelineError};
    use crate::filters::operation::Operation;
    use proptest::prelude::*;

    fn items(values: &[f32]) -> Vec<WorkItem> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                WorkItem::new(
                    i,
                    PlaneCoord::tile(i / 4, i % 4),
                    Plane::from_shape_fn((6, 5), |(y, x)| v + (y * 5 + x) as f32),
                )
            })
            .collect()
    }

    fn chain() -> OpChain {
        OpChain::new(vec![
            Operation::GaussianBlur { sigma: 1.0 },
            Operation::Gamma { gamma: 2.0 },
        ])
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let plane = Plane::from_shape_fn((7, 3), |(y, x)| (y as f32).sin() + x as f32);
        let out = apply_chain(plane.clone(), &OpChain::empty()).unwrap();
        assert_eq!(out, plane);
    }

    #[test]
    fn test_chain_folds_left_to_right() {
        let plane = Plane::from_shape_fn((4, 4), |(y, x)| (y * 4 + x) as f32);
        let rescale_then_gamma = OpChain::new(vec![
            Operation::Rescale { range: (0.0, 2.0) },
            Operation::Gamma { gamma: 2.0 },
        ]);
        let gamma_then_rescale = OpChain::new(vec![
            Operation::Gamma { gamma: 2.0 },
            Operation::Rescale { range: (0.0, 2.0) },
        ]);
        let a = apply_chain(plane.clone(), &rescale_then_gamma).unwrap();
        let b = apply_chain(plane, &gamma_then_rescale).unwrap();
        assert!((a[[3, 3]] - 4.0).abs() < 1e-5);
        assert!((b[[3, 3]] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_order_preserved_for_fixed_sizes() {
        for n in [0usize, 1, 50] {
            let values: Vec<f32> = (0..n).map(|i| i as f32 * 10.0).collect();
            let expected: Vec<Plane> = items(&values)
                .into_iter()
                .map(|item| apply_chain(item.plane, &chain()).unwrap())
                .collect();
            for workers in [1, 4] {
                let engine = TileEngine::new(WorkerPool::new(workers));
                let out = engine
                    .process_channel_planes(0, items(&values), &chain())
                    .unwrap();
                assert_eq!(out, expected, "n={} workers={}", n, workers);
            }
        }
    }

    #[test]
    fn test_failure_names_channel_and_plane() {
        let mut batch = items(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        batch[5].plane[[0, 0]] = -50.0;
        let engine = TileEngine::new(WorkerPool::new(3));
        let chain = OpChain::new(vec![Operation::Gamma { gamma: 0.5 }]);

        let err = engine.process_channel_planes(2, batch, &chain).unwrap_err();
        match err {
            PipelineError::Plane(e) => {
                assert_eq!(e.channel, 2);
                assert_eq!(e.index, 5);
                assert_eq!(e.coord, PlaneCoord::tile(1, 1));
                assert!(matches!(e.source, OperationError::NegativeIntensity { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_non_finite_plane_fails_batch() {
        let mut batch = items(&[1.0, 2.0, 3.0]);
        batch[1].plane[[2, 2]] = f32::NAN;
        let engine = TileEngine::new(WorkerPool::new(2));
        let chain = OpChain::new(vec![Operation::EqualizeHist { bins: 256 }]);

        let err = engine.process_channel_planes(0, batch, &chain).unwrap_err();
        match err {
            PipelineError::Plane(e) => {
                assert_eq!(e.index, 1);
                assert_eq!(e.source.operation(), "eq_hist");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_order_preserved_for_random_planes(
            values in proptest::collection::vec(0.0f32..1000.0, 0..60),
            workers in 1usize..5,
        ) {
            let expected: Vec<Plane> = items(&values)
                .into_iter()
                .map(|item| apply_chain(item.plane, &chain()).unwrap())
                .collect();
            let out = TileEngine::new(WorkerPool::new(workers))
                .process_channel_planes(0, items(&values), &chain())
                .unwrap();
            prop_assert_eq!(out, expected);
        }
    }
}
