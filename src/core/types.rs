//! Small value types shared across the pipeline stages.
//!
//! These are deliberately plain: they travel through logs, progress events and
//! errors, so they are cheap to copy and render compactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one pipeline run.
///
/// Used to correlate log lines and progress events of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// The four strictly ordered stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Resolve channel names and operation names into concrete chains.
    PlanResolution,
    /// Apply per-channel chains to every (time, tile) plane.
    TileProcessing,
    /// Reassemble tile grids into mosaics.
    Stitching,
    /// Apply the post-assembly chain to every (time, channel) mosaic.
    PostStitch,
}

impl PipelineStage {
    /// Get the display name for this stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            PipelineStage::PlanResolution => "plan resolution",
            PipelineStage::TileProcessing => "tile processing",
            PipelineStage::Stitching => "stitching",
            PipelineStage::PostStitch => "post-stitch processing",
        }
    }

    /// All stages in execution order.
    pub fn all() -> &'static [PipelineStage] {
        &[
            PipelineStage::PlanResolution,
            PipelineStage::TileProcessing,
            PipelineStage::Stitching,
            PipelineStage::PostStitch,
        ]
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How the tiles of one acquisition are laid out on a 2-D grid.
///
/// Serialized as a `[rows, cols]` pair, matching parameter files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct GridShape {
    /// Number of tile rows.
    pub rows: usize,
    /// Number of tile columns.
    pub cols: usize,
}

impl GridShape {
    /// Create a new grid shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of tiles the grid holds.
    pub fn tile_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Grid position `(row, col)` of a tile index, filled row-major.
    pub fn position(&self, tile: usize) -> (usize, usize) {
        (tile / self.cols, tile % self.cols)
    }
}

impl From<(usize, usize)> for GridShape {
    fn from((rows, cols): (usize, usize)) -> Self {
        Self { rows, cols }
    }
}

impl From<GridShape> for (usize, usize) {
    fn from(grid: GridShape) -> Self {
        (grid.rows, grid.cols)
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Originating position of a work item inside its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaneCoord {
    /// Time index.
    pub time: usize,
    /// Tile index, absent once tiles have been stitched.
    pub tile: Option<usize>,
}

impl PlaneCoord {
    /// Coordinate of a tile plane.
    pub fn tile(time: usize, tile: usize) -> Self {
        Self {
            time,
            tile: Some(tile),
        }
    }

    /// Coordinate of a stitched plane.
    pub fn stitched(time: usize) -> Self {
        Self { time, tile: None }
    }
}

impl fmt::Display for PlaneCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tile {
            Some(tile) => write!(f, "t={} m={}", self.time, tile),
            None => write!(f, "t={}", self.time),
        }
    }
}
