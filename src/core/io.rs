//! Scene sources and sinks.
//!
//! The pipeline performs no file I/O of its own. Readers hand scenes in through
//! [`SceneSource`] and writers receive every produced tensor through
//! [`SceneSink`], tagged with the stage that produced it. In-memory
//! implementations are provided for tests and embedding.

use crate::core::channels::ChannelMap;
use crate::core::error::PipelineResult;
use crate::core::tensor::SceneTensor;
use crate::core::types::PipelineStage;
use indexmap::IndexMap;

/// Something that can provide a scene tensor and its channel metadata.
pub trait SceneSource: Send + Sync {
    /// Channel name → index mapping of the scene.
    fn channel_map(&self) -> &ChannelMap;

    /// Read the whole scene.
    fn read_scene(&self) -> PipelineResult<SceneTensor>;

    /// Human-readable description for log lines.
    fn describe(&self) -> String {
        "scene source".to_string()
    }
}

/// Something that receives stage outputs.
pub trait SceneSink: Send {
    /// Accept the tensor produced by `stage`.
    fn write(&mut self, stage: PipelineStage, scene: &SceneTensor) -> PipelineResult<()>;

    /// Called once after the last stage.
    fn finalize(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

/// Scene source backed by an in-memory tensor.
pub struct MemorySceneSource {
    scene: SceneTensor,
    channels: ChannelMap,
}

impl MemorySceneSource {
    /// Create a source from a tensor and its channel map.
    pub fn new(scene: SceneTensor, channels: ChannelMap) -> Self {
        Self { scene, channels }
    }
}

impl SceneSource for MemorySceneSource {
    fn channel_map(&self) -> &ChannelMap {
        &self.channels
    }

    fn read_scene(&self) -> PipelineResult<SceneTensor> {
        Ok(self.scene.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory scene {}", self.scene.shape())
    }
}

/// Sink that keeps every stage output in memory.
#[derive(Debug, Default)]
pub struct MemorySceneSink {
    outputs: IndexMap<PipelineStage, SceneTensor>,
    finalized: bool,
}

impl MemorySceneSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Output written for a stage, if any.
    pub fn get(&self, stage: PipelineStage) -> Option<&SceneTensor> {
        self.outputs.get(&stage)
    }

    /// Stages written so far, in write order.
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.outputs.keys().copied().collect()
    }

    /// Whether `finalize` has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Take all outputs.
    pub fn into_outputs(self) -> IndexMap<PipelineStage, SceneTensor> {
        self.outputs
    }
}

impl SceneSink for MemorySceneSink {
    fn write(&mut self, stage: PipelineStage, scene: &SceneTensor) -> PipelineResult<()> {
        log::debug!("Sink received {} output {}", stage, scene.shape());
        self.outputs.insert(stage, scene.clone());
        Ok(())
    }

    fn finalize(&mut self) -> PipelineResult<()> {
        self.finalized = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tensor::{AxisOrder, SceneShape};

    #[test]
    fn test_memory_source() {
        let scene = SceneTensor::zeros(SceneShape::new(1, 2, 1, 4, 4), AxisOrder::TCMYX);
        let channels = ChannelMap::from_names(["a", "b"]).unwrap();
        let source = MemorySceneSource::new(scene.clone(), channels);
        assert_eq!(source.channel_map().len(), 2);
        assert_eq!(source.read_scene().unwrap(), scene);
        assert!(source.describe().contains("C=2"));
    }

    #[test]
    fn test_memory_sink_records_stages() {
        let scene = SceneTensor::zeros(SceneShape::new(1, 1, 1, 2, 2), AxisOrder::TCMYX);
        let mut sink = MemorySceneSink::new();
        sink.write(PipelineStage::TileProcessing, &scene).unwrap();
        sink.write(PipelineStage::Stitching, &scene).unwrap();
        sink.finalize().unwrap();

        assert!(sink.is_finalized());
        assert_eq!(
            sink.stages(),
            vec![PipelineStage::TileProcessing, PipelineStage::Stitching]
        );
        assert!(sink.get(PipelineStage::PostStitch).is_none());
    }
}
