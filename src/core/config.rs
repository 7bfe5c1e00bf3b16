//! Pipeline configuration.
//!
//! One immutable [`PipelineConfig`] describes a whole run: which channels are
//! processed with which operation chains, the flat parameter set those
//! operations draw from, and how tiles are stitched. Parameter files are JSON
//! or TOML and share one flat key namespace.

use crate::core::error::{ConfigError, ConfigResult, PipelineError, PipelineResult};
use crate::core::types::GridShape;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Seed level for static-seed dilation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeedLevelRepr", into = "SeedLevelRepr")]
pub enum SeedLevel {
    /// Subtract a fixed intensity.
    Fixed(f32),
    /// Subtract the median intensity of each plane.
    MedianOfImage,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SeedLevelRepr {
    Level(f32),
    Policy(String),
}

impl TryFrom<SeedLevelRepr> for SeedLevel {
    type Error = String;

    fn try_from(repr: SeedLevelRepr) -> Result<Self, Self::Error> {
        match repr {
            SeedLevelRepr::Level(level) => Ok(SeedLevel::Fixed(level)),
            SeedLevelRepr::Policy(policy) => match policy.to_ascii_lowercase().as_str() {
                "median" | "m" => Ok(SeedLevel::MedianOfImage),
                other => Err(format!(
                    "unknown seed policy '{}', expected a number or \"median\"",
                    other
                )),
            },
        }
    }
}

impl From<SeedLevel> for SeedLevelRepr {
    fn from(level: SeedLevel) -> Self {
        match level {
            SeedLevel::Fixed(level) => SeedLevelRepr::Level(level),
            SeedLevel::MedianOfImage => SeedLevelRepr::Policy("median".to_string()),
        }
    }
}

impl fmt::Display for SeedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedLevel::Fixed(level) => write!(f, "{}", level),
            SeedLevel::MedianOfImage => f.write_str("median"),
        }
    }
}

/// Flat parameter set shared by every operation of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationParameters {
    /// Rolling-ball radius in pixels.
    pub rolling_ball_radius: f32,
    /// Border width kept at the original intensity in the dilation seed.
    pub dilation_box_size: usize,
    /// Seed offset for static-seed dilation.
    pub static_dilation_h: SeedLevel,
    /// CLAHE clip limit as a fraction of the contextual tile area.
    pub adaptive_hist_clip: f32,
    /// CLAHE contextual tile size; `None` uses 1/8 of each plane extent.
    pub adaptive_hist_kernel_size: Option<usize>,
    /// Histogram bins for equalisation.
    pub histogram_bins: usize,
    /// Disk radius for local equalisation.
    pub local_eq_radius: usize,
    /// Gaussian blur sigma.
    pub gaussian_blur_sigma: f32,
    /// Gamma exponent.
    pub gamma_correction: f32,
    /// Gain for logarithmic correction.
    #[serde(alias = "contrast_correction_gain")]
    pub log_correction_gain: f32,
    /// Output range for linear rescale.
    pub intensity_rescale_range: (f32, f32),
    /// Lower and upper percentiles for contrast stretch.
    pub stretch_percentiles: (f32, f32),
    /// Integer downscale factor of the tile-stage resize.
    pub tile_resize_factor: usize,
}

impl Default for OperationParameters {
    fn default() -> Self {
        Self {
            rolling_ball_radius: 100.0,
            dilation_box_size: 1,
            static_dilation_h: SeedLevel::Fixed(0.1),
            adaptive_hist_clip: 0.01,
            adaptive_hist_kernel_size: None,
            histogram_bins: 256,
            local_eq_radius: 5,
            gaussian_blur_sigma: 1.0,
            gamma_correction: 1.0,
            log_correction_gain: 1.0,
            intensity_rescale_range: (0.0, 1.0),
            stretch_percentiles: (0.2, 99.8),
            tile_resize_factor: 1,
        }
    }
}

impl OperationParameters {
    /// Collect every out-of-range parameter.
    pub fn issues(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();
        let mut check = |ok: bool, parameter: &str, value: String, reason: &str| {
            if !ok {
                issues.push(ConfigError::InvalidParameter {
                    parameter: parameter.to_string(),
                    value,
                    reason: reason.to_string(),
                });
            }
        };

        check(
            self.rolling_ball_radius.is_finite() && self.rolling_ball_radius >= 0.0,
            "rolling_ball_radius",
            self.rolling_ball_radius.to_string(),
            "must be a non-negative number",
        );
        if let SeedLevel::Fixed(level) = self.static_dilation_h {
            check(
                level.is_finite() && level >= 0.0,
                "static_dilation_h",
                level.to_string(),
                "must be non-negative or \"median\"",
            );
        }
        check(
            self.adaptive_hist_clip > 0.0 && self.adaptive_hist_clip <= 1.0,
            "adaptive_hist_clip",
            self.adaptive_hist_clip.to_string(),
            "must lie in (0, 1]",
        );
        if let Some(kernel) = self.adaptive_hist_kernel_size {
            check(
                kernel > 0,
                "adaptive_hist_kernel_size",
                kernel.to_string(),
                "must be at least 1",
            );
        }
        check(
            self.histogram_bins >= 2,
            "histogram_bins",
            self.histogram_bins.to_string(),
            "must be at least 2",
        );
        check(
            self.gaussian_blur_sigma.is_finite() && self.gaussian_blur_sigma > 0.0,
            "gaussian_blur_sigma",
            self.gaussian_blur_sigma.to_string(),
            "must be positive",
        );
        check(
            self.gamma_correction.is_finite() && self.gamma_correction > 0.0,
            "gamma_correction",
            self.gamma_correction.to_string(),
            "must be positive",
        );
        check(
            self.log_correction_gain.is_finite(),
            "log_correction_gain",
            self.log_correction_gain.to_string(),
            "must be finite",
        );
        let (lo, hi) = self.intensity_rescale_range;
        check(
            lo.is_finite() && hi.is_finite() && lo <= hi,
            "intensity_rescale_range",
            format!("[{}, {}]", lo, hi),
            "lower bound must not exceed upper bound",
        );
        let (p_lo, p_hi) = self.stretch_percentiles;
        check(
            (0.0..=100.0).contains(&p_lo) && (0.0..=100.0).contains(&p_hi) && p_lo < p_hi,
            "stretch_percentiles",
            format!("[{}, {}]", p_lo, p_hi),
            "must be increasing percentiles within [0, 100]",
        );
        check(
            self.tile_resize_factor >= 1,
            "tile_resize_factor",
            self.tile_resize_factor.to_string(),
            "must be at least 1",
        );
        issues
    }
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Channel name → ordered operation names for the tile stage.
    pub process_channels: IndexMap<String, Vec<String>>,
    /// Parameters shared by all operations.
    #[serde(flatten)]
    pub parameters: OperationParameters,
    /// Tile grid layout; stitching is skipped when absent.
    pub grid_shape: Option<GridShape>,
    /// Downscale factor applied to stitched mosaics.
    pub quilt_resize_factor: usize,
    /// Rescale each stitched (time, channel) mosaic to [0, 1].
    #[serde(alias = "rescale_quilt")]
    pub rescale_on_stitch: bool,
    /// Worker pool size; 0 uses every available CPU.
    pub parallel_procs: usize,
    /// Operation names applied to every channel after stitching.
    pub stitch_processing: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            process_channels: IndexMap::new(),
            parameters: OperationParameters::default(),
            grid_shape: None,
            quilt_resize_factor: 1,
            rescale_on_stitch: false,
            parallel_procs: 0,
            stitch_processing: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a file; `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let config = if is_toml {
            Self::from_toml_str(&text)?
        } else {
            Self::from_json_str(&text)?
        };
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse from JSON text.
    pub fn from_json_str(text: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> PipelineResult<Self> {
        let config: Self = toml::from_str(text).map_err(PipelineError::Toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Collect every scalar invariant violation.
    pub fn issues(&self) -> Vec<ConfigError> {
        let mut issues = self.parameters.issues();
        if self.quilt_resize_factor == 0 {
            issues.push(ConfigError::InvalidParameter {
                parameter: "quilt_resize_factor".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(grid) = self.grid_shape {
            if grid.rows == 0 || grid.cols == 0 {
                issues.push(ConfigError::InvalidParameter {
                    parameter: "grid_shape".to_string(),
                    value: grid.to_string(),
                    reason: "rows and cols must both be at least 1".to_string(),
                });
            }
        }
        issues
    }

    /// Check scalar invariants, failing on the first violation.
    pub fn validate(&self) -> ConfigResult<()> {
        match self.issues().into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(()),
        }
    }

    /// Add a tile-stage chain for a channel.
    pub fn with_channel<S: Into<String>>(mut self, channel: S, ops: &[&str]) -> Self {
        self.process_channels
            .insert(channel.into(), ops.iter().map(|op| op.to_string()).collect());
        self
    }

    /// Replace the operation parameters.
    pub fn with_parameters(mut self, parameters: OperationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the tile grid.
    pub fn with_grid_shape(mut self, rows: usize, cols: usize) -> Self {
        self.grid_shape = Some(GridShape::new(rows, cols));
        self
    }

    /// Set the stitched-mosaic downscale factor.
    pub fn with_quilt_resize_factor(mut self, factor: usize) -> Self {
        self.quilt_resize_factor = factor;
        self
    }

    /// Enable or disable per-mosaic rescaling.
    pub fn with_rescale_on_stitch(mut self, rescale: bool) -> Self {
        self.rescale_on_stitch = rescale;
        self
    }

    /// Set the worker pool size.
    pub fn with_parallel_procs(mut self, procs: usize) -> Self {
        self.parallel_procs = procs;
        self
    }

    /// Set the post-stitch chain.
    pub fn with_stitch_processing(mut self, ops: &[&str]) -> Self {
        self.stitch_processing = ops.iter().map(|op| op.to_string()).collect();
        self
    }
}
