//! Bounded worker pool with an order-preserving blocking map.

use crate::core::error::{PipelineError, PipelineResult};
use rayon::prelude::*;

/// A bounded pool of worker threads.
///
/// Each [`map_ordered`](WorkerPool::map_ordered) call builds its own rayon
/// pool, runs one batch to completion and tears the pool down before
/// returning, on success and on error alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    /// Create a pool of `size` workers (0 = use all available).
    pub fn new(size: usize) -> Self {
        let size = if size == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            size
        };
        Self { size }
    }

    /// Single-worker pool.
    pub fn sequential() -> Self {
        Self { size: 1 }
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Apply `f` to every item and return the results in input order.
    ///
    /// Blocks until the whole batch completes. If any item fails, the
    /// batch is abandoned and one of the failures is returned.
    pub fn map_ordered<T, U, E, F>(&self, items: Vec<T>, f: F) -> PipelineResult<Vec<U>>
    where
        T: Send,
        U: Send,
        E: Send + Into<PipelineError>,
        F: Fn(T) -> Result<U, E> + Send + Sync,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.size)
            .thread_name(|i| format!("quiltpipe-worker-{}", i))
            .build()?;
        log::trace!("Mapping {} items over {} workers", items.len(), self.size);
        pool.install(|| items.into_par_iter().map(&f).collect::<Result<Vec<U>, E>>())
            .map_err(Into::into)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(0)
    }
}
