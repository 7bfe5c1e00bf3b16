//! Progress tracking for pipeline runs.

use crate::core::types::{PipelineStage, RunId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// A run has started.
    Started {
        /// Run identifier.
        run_id: RunId,
        /// Channel batches expected across all stages.
        total_batches: usize,
    },
    /// A stage has started.
    StageStarted {
        /// The stage.
        stage: PipelineStage,
    },
    /// A stage has completed.
    StageCompleted {
        /// The stage.
        stage: PipelineStage,
        /// Wall time of the stage.
        duration_ms: u64,
    },
    /// A stage was skipped by configuration.
    StageSkipped {
        /// The stage.
        stage: PipelineStage,
        /// Why it did not run.
        reason: SkipReason,
    },
    /// A channel batch was submitted to the worker pool.
    ChannelStarted {
        /// Stage the batch belongs to.
        stage: PipelineStage,
        /// Tensor channel index.
        channel: usize,
        /// Channel name.
        name: String,
        /// Number of planes in the batch.
        planes: usize,
    },
    /// A channel batch completed.
    ChannelCompleted {
        /// Stage the batch belongs to.
        stage: PipelineStage,
        /// Tensor channel index.
        channel: usize,
        /// Wall time of the batch.
        duration_ms: u64,
    },
    /// A channel was copied through without a chain.
    ChannelPassedThrough {
        /// Stage the channel belongs to.
        stage: PipelineStage,
        /// Tensor channel index.
        channel: usize,
    },
    /// Overall progress percentage.
    Progress {
        /// Percent of channel batches done.
        percent: f32,
        /// Time since start.
        elapsed_ms: u64,
        /// Estimate from the mean batch time.
        estimated_remaining_ms: Option<u64>,
    },
    /// The run has completed.
    Completed {
        /// Total wall time.
        total_duration_ms: u64,
        /// Channel batches processed.
        batches_processed: usize,
        /// Channels copied through.
        channels_passed_through: usize,
    },
    /// An error ended the run.
    Error {
        /// Stage in which the error occurred.
        stage: Option<PipelineStage>,
        /// Error message.
        message: String,
    },
}

/// Reason why a stage was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No channel has a chain.
    NoChannels,
    /// No grid shape was configured.
    NoGrid,
    /// The post-stitch chain is empty.
    EmptyChain,
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Tracks run progress in units of channel batches.
pub struct ProgressTracker {
    /// Total number of channel batches expected.
    total_batches: usize,
    /// Number of batches completed.
    completed_batches: AtomicU64,
    /// Number of channels copied through.
    passed_channels: AtomicU64,
    /// Start time.
    start_time: Option<Instant>,
    /// Progress callback.
    callback: Option<Arc<ProgressCallback>>,
    /// Batch completion times for estimation.
    batch_times: parking_lot::Mutex<Vec<u64>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(total_batches: usize) -> Self {
        Self {
            total_batches,
            completed_batches: AtomicU64::new(0),
            passed_channels: AtomicU64::new(0),
            start_time: None,
            callback: None,
            batch_times: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Start tracking.
    pub fn start(&mut self, run_id: RunId) {
        self.start_time = Some(Instant::now());
        self.send_update(ProgressUpdate::Started {
            run_id,
            total_batches: self.total_batches,
        });
    }

    /// Report that a stage has started.
    pub fn stage_started(&self, stage: PipelineStage) {
        self.send_update(ProgressUpdate::StageStarted { stage });
    }

    /// Report that a stage has completed.
    pub fn stage_completed(&self, stage: PipelineStage, duration_ms: u64) {
        self.send_update(ProgressUpdate::StageCompleted { stage, duration_ms });
    }

    /// Report that a stage was skipped.
    pub fn stage_skipped(&self, stage: PipelineStage, reason: SkipReason) {
        self.send_update(ProgressUpdate::StageSkipped { stage, reason });
    }

    /// Report that a channel batch was submitted.
    pub fn channel_started(&self, stage: PipelineStage, channel: usize, name: String, planes: usize) {
        self.send_update(ProgressUpdate::ChannelStarted {
            stage,
            channel,
            name,
            planes,
        });
    }

    /// Report that a channel batch has completed.
    pub fn channel_completed(&self, stage: PipelineStage, channel: usize, duration_ms: u64) {
        self.completed_batches.fetch_add(1, Ordering::Relaxed);
        self.batch_times.lock().push(duration_ms);

        self.send_update(ProgressUpdate::ChannelCompleted {
            stage,
            channel,
            duration_ms,
        });
        self.send_progress_update();
    }

    /// Report that a channel was copied through.
    pub fn channel_passed_through(&self, stage: PipelineStage, channel: usize) {
        self.passed_channels.fetch_add(1, Ordering::Relaxed);
        self.send_update(ProgressUpdate::ChannelPassedThrough { stage, channel });
    }

    /// Report an error.
    pub fn report_error(&self, stage: Option<PipelineStage>, message: String) {
        self.send_update(ProgressUpdate::Error { stage, message });
    }

    /// Complete tracking.
    pub fn complete(&self) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.elapsed_ms(),
            batches_processed: self.completed_batches.load(Ordering::Relaxed) as usize,
            channels_passed_through: self.passed_channels.load(Ordering::Relaxed) as usize,
        });
    }

    /// Get current progress percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.total_batches == 0 {
            return 100.0;
        }
        let completed = self.completed_batches.load(Ordering::Relaxed);
        (completed as f32 / self.total_batches as f32 * 100.0).min(100.0)
    }

    /// Estimate remaining time in milliseconds.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        let times = self.batch_times.lock();
        if times.is_empty() {
            return None;
        }

        let avg_time: u64 = times.iter().sum::<u64>() / times.len() as u64;
        let completed = self.completed_batches.load(Ordering::Relaxed) as usize;
        let remaining = self.total_batches.saturating_sub(completed);

        Some(avg_time * remaining as u64)
    }

    fn elapsed_ms(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }

    fn send_progress_update(&self) {
        self.send_update(ProgressUpdate::Progress {
            percent: self.progress_percent(),
            elapsed_ms: self.elapsed_ms(),
            estimated_remaining_ms: self.estimated_remaining_ms(),
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_progress_calculation() {
        let tracker = ProgressTracker::new(4);
        assert_eq!(tracker.progress_percent(), 0.0);

        tracker.channel_completed(PipelineStage::TileProcessing, 0, 10);
        tracker.channel_completed(PipelineStage::TileProcessing, 1, 30);
        assert_eq!(tracker.progress_percent(), 50.0);
        assert_eq!(tracker.estimated_remaining_ms(), Some(40));

        assert_eq!(ProgressTracker::new(0).progress_percent(), 100.0);
    }

    #[test]
    fn test_callback_invoked() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();
        let callback: ProgressCallback = Box::new(move |_| {
            call_count_clone.fetch_add(1, Ordering::Relaxed);
        });

        let mut tracker = ProgressTracker::new(2).with_callback(Arc::new(callback));
        tracker.start(RunId::new());
        tracker.stage_started(PipelineStage::TileProcessing);
        tracker.channel_started(PipelineStage::TileProcessing, 0, "dapi".to_string(), 8);
        tracker.channel_completed(PipelineStage::TileProcessing, 0, 5);
        tracker.channel_passed_through(PipelineStage::TileProcessing, 1);
        tracker.complete();

        // Started, StageStarted, ChannelStarted, ChannelCompleted, Progress,
        // ChannelPassedThrough, Completed
        assert_eq!(call_count.load(Ordering::Relaxed), 7);
    }
}
