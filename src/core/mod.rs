//! Core types for the quiltpipe preprocessing pipeline.
//!
//! This module contains the foundational types shared by every stage:
//! - Scene tensors with explicit axis order
//! - Channel metadata
//! - Run configuration and operation parameters
//! - Error types and validation reports
//! - Scene source and sink traits

pub mod types;
pub mod tensor;
pub mod channels;
pub mod config;
pub mod error;
pub mod io;

// Re-export commonly used types
pub use types::{GridShape, PipelineStage, PlaneCoord, RunId};
pub use tensor::{AxisOrder, Dim, Pixel, Plane, SceneShape, SceneTensor};
pub use channels::ChannelMap;
pub use config::{OperationParameters, PipelineConfig, SeedLevel};
pub use error::{
    ConfigError, OperationError, PipelineError, PlaneProcessingError, ShapeError,
    ValidationReport, ValidationWarning,
};
pub use io::{MemorySceneSink, MemorySceneSource, SceneSink, SceneSource};
