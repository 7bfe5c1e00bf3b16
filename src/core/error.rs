//! Error types for quiltpipe.
//!
//! Uses thiserror for structured errors with context. Errors fall in three
//! families:
//! - Configuration errors, detected before any plane is touched
//! - Per-plane processing errors, tagged with channel and plane position
//! - Shape-consistency errors, raised before a stage returns

use crate::core::types::{GridShape, PlaneCoord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for quiltpipe.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plane processing error: {0}")]
    Plane(#[from] PlaneProcessingError),

    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Worker pool error: {0}")]
    Pool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<rayon::ThreadPoolBuildError> for PipelineError {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        PipelineError::Pool(error.to_string())
    }
}

/// Errors in configuration or channel metadata.
///
/// All of these are fatal to the run and are raised during plan resolution,
/// before any parallel work is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Unknown operation '{name}' in {context}")]
    UnknownOperation { name: String, context: String },

    #[error("Operation '{name}' is disabled in this registry")]
    DisabledOperation { name: String },

    #[error("Unknown channel '{name}'")]
    UnknownChannel { name: String },

    #[error("Grid shape {grid} holds {} tiles but the scene has {tiles}", .grid.tile_count())]
    GridShapeMismatch { grid: GridShape, tiles: usize },

    #[error(
        "Mixed resize chains: channel '{channel}' resizes {depth} time(s) but other channels resize {expected} time(s)"
    )]
    MixedResize {
        channel: String,
        depth: usize,
        expected: usize,
    },

    #[error("Invalid value {value} for parameter '{parameter}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Invalid channel map: {0}")]
    InvalidChannelMap(String),
}

/// Failure of one operation on one plane.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("{operation} requires non-negative intensities, found minimum {min}")]
    NegativeIntensity { operation: &'static str, min: f32 },

    #[error("{operation} cannot separate classes in a uniform plane (value {value})")]
    UniformPlane { operation: &'static str, value: f32 },

    #[error("{operation} received an empty plane")]
    EmptyPlane { operation: &'static str },

    #[error("{operation}: downscale factor {factor} collapses a {height}x{width} plane")]
    FactorTooLarge {
        operation: &'static str,
        factor: usize,
        height: usize,
        width: usize,
    },

    #[error("{operation}: median seed level {level} is negative")]
    NegativeSeed { operation: &'static str, level: f32 },

    #[error("{operation} received {count} non-finite intensities")]
    NonFiniteIntensity { operation: &'static str, count: usize },
}

impl OperationError {
    /// Name of the operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            OperationError::NegativeIntensity { operation, .. }
            | OperationError::UniformPlane { operation, .. }
            | OperationError::EmptyPlane { operation }
            | OperationError::FactorTooLarge { operation, .. }
            | OperationError::NegativeSeed { operation, .. }
            | OperationError::NonFiniteIntensity { operation, .. } => *operation,
        }
    }
}

/// A plane failed inside a channel batch; the whole batch is aborted.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("channel {channel}, plane {index} ({coord}): {source}")]
pub struct PlaneProcessingError {
    /// Tensor channel index of the batch.
    pub channel: usize,
    /// Position of the plane in the submitted work list.
    pub index: usize,
    /// Originating (time, tile) coordinate.
    pub coord: PlaneCoord,
    /// The operation failure.
    #[source]
    pub source: OperationError,
}

/// Errors about tensor shapes and axis orders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Axis order must name each of T, C, M, Y, X exactly once, got {0}")]
    InvalidAxisOrder(String),

    #[error("Data has {got} dimensions, expected 5")]
    Dimensionality { got: usize },

    #[error("Plane {index} of channel {channel} has shape {got:?}, expected {expected:?}")]
    Reassembly {
        channel: usize,
        index: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Resize factor {factor} collapses extent {extent} to zero")]
    ResizeCollapse { factor: usize, extent: usize },

    #[error("Expected a single tile per plane after stitching, found {tiles}")]
    NotStitched { tiles: usize },

    #[error("Channel map lists {expected} channels but the scene has {got}")]
    ChannelCount { expected: usize, got: usize },
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type alias for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

// ============================================================================
// Validation Report
// ============================================================================

/// Report produced by the plan validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether validation passed without errors.
    pub success: bool,
    /// List of errors found.
    pub errors: Vec<ConfigError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<ValidationWarning>,
    /// Time taken for validation in milliseconds.
    pub duration_ms: u64,
}

/// Non-fatal validation warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Warning message.
    pub message: String,
    /// Suggestion for addressing the warning.
    pub suggestion: Option<String>,
}

impl ConfigError {
    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ConfigError::UnknownOperation { name, .. } => Some(format!(
                "Check the spelling of '{}' or run `quiltpipe list`",
                name
            )),
            ConfigError::UnknownChannel { name } => Some(format!(
                "Use one of the channel names from the scene metadata instead of '{}'",
                name
            )),
            ConfigError::GridShapeMismatch { tiles, .. } => Some(format!(
                "Choose grid_shape rows and cols whose product is {}",
                tiles
            )),
            ConfigError::MixedResize { .. } => Some(
                "Add 'resize' to every processed channel or remove it from all of them"
                    .to_string(),
            ),
            ConfigError::InvalidParameter { parameter, reason, .. } => {
                Some(format!("Adjust '{}': {}", parameter, reason))
            }
            _ => None,
        }
    }
}

impl ValidationReport {
    /// Create a new empty report (success).
    pub fn new() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Add an error to the report.
    pub fn add_error(&mut self, error: ConfigError) {
        self.success = false;
        self.errors.push(error);
    }

    /// Add a warning to the report.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Check if the run can proceed.
    pub fn can_execute(&self) -> bool {
        self.success
    }

    /// Convert into the first error, if any.
    pub fn into_result(self) -> ConfigResult<Vec<ValidationWarning>> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.warnings),
        }
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        if self.success {
            if self.warnings.is_empty() {
                "✓ Configuration is valid and ready to run".to_string()
            } else {
                format!(
                    "✓ Configuration is valid with {} warning(s)",
                    self.warnings.len()
                )
            }
        } else {
            format!("✗ Validation failed with {} error(s)", self.errors.len())
        }
    }

    /// Get detailed error messages with suggestions.
    pub fn detailed_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, error)| {
                let mut msg = format!("{}. {}", i + 1, error);
                if let Some(fix) = error.suggested_fix() {
                    msg.push_str(&format!("\n   → Suggestion: {}", fix));
                }
                msg
            })
            .collect()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}
