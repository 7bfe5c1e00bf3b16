//! Operation kinds, resolved operations and operation chains.
//!
//! Operation names from configuration are resolved once, at plan time, into
//! [`Operation`] values that carry their own parameters. After that no name
//! lookup happens; applying a chain is a plain fold over a vector.

use crate::core::config::{OperationParameters, SeedLevel};
use crate::core::error::{ConfigError, ConfigResult, OperationError, ShapeError};
use crate::core::tensor::{Pixel, Plane};
use crate::filters::builtin::{background, blur, histogram, intensity, morphology, resize, threshold};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Rolling-ball background subtraction.
    RollingBall,
    /// Variable-box reconstruction background subtraction.
    Dilate,
    /// Static-seed reconstruction background subtraction.
    StaticDilate,
    /// Global histogram equalisation.
    EqualizeHist,
    /// Contrast-limited adaptive histogram equalisation.
    AdaptiveHist,
    /// Local disk rank equalisation.
    LocalEqualize,
    /// Otsu threshold region map.
    Otsu,
    /// Gaussian blur.
    GaussianBlur,
    /// Gamma correction.
    Gamma,
    /// Logarithmic contrast correction.
    LogCorrection,
    /// Linear intensity rescale.
    Rescale,
    /// Percentile contrast stretch.
    Stretch,
    /// Integer area downscale.
    Resize,
}

impl OperationKind {
    /// Every kind, in registration order.
    pub fn all() -> &'static [OperationKind] {
        use OperationKind::*;
        &[
            RollingBall,
            Dilate,
            StaticDilate,
            EqualizeHist,
            AdaptiveHist,
            LocalEqualize,
            Otsu,
            GaussianBlur,
            Gamma,
            LogCorrection,
            Rescale,
            Stretch,
            Resize,
        ]
    }

    /// Configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::RollingBall => "ball",
            OperationKind::Dilate => "dilate",
            OperationKind::StaticDilate => "dilate_s",
            OperationKind::EqualizeHist => "eq_hist",
            OperationKind::AdaptiveHist => "ada_hist",
            OperationKind::LocalEqualize => "local_eq",
            OperationKind::Otsu => "otsu",
            OperationKind::GaussianBlur => "blur",
            OperationKind::Gamma => "gamma",
            OperationKind::LogCorrection => "log",
            OperationKind::Rescale => "rescale",
            OperationKind::Stretch => "stretch",
            OperationKind::Resize => "resize",
        }
    }

    /// Build the concrete operation from the run's parameters.
    pub fn build(&self, params: &OperationParameters) -> ConfigResult<Operation> {
        let op = match self {
            OperationKind::RollingBall => Operation::RollingBall {
                radius: params.rolling_ball_radius,
            },
            OperationKind::Dilate => Operation::Dilate {
                box_size: params.dilation_box_size,
            },
            OperationKind::StaticDilate => Operation::StaticDilate {
                seed: params.static_dilation_h,
            },
            OperationKind::EqualizeHist => Operation::EqualizeHist {
                bins: params.histogram_bins,
            },
            OperationKind::AdaptiveHist => Operation::AdaptiveHist {
                clip: params.adaptive_hist_clip,
                kernel: params.adaptive_hist_kernel_size,
                bins: params.histogram_bins,
            },
            OperationKind::LocalEqualize => Operation::LocalEqualize {
                radius: params.local_eq_radius,
            },
            OperationKind::Otsu => Operation::Otsu,
            OperationKind::GaussianBlur => Operation::GaussianBlur {
                sigma: params.gaussian_blur_sigma,
            },
            OperationKind::Gamma => Operation::Gamma {
                gamma: params.gamma_correction,
            },
            OperationKind::LogCorrection => Operation::LogCorrection {
                gain: params.log_correction_gain,
            },
            OperationKind::Rescale => Operation::Rescale {
                range: params.intensity_rescale_range,
            },
            OperationKind::Stretch => Operation::Stretch {
                percentiles: params.stretch_percentiles,
            },
            OperationKind::Resize => {
                if params.tile_resize_factor == 0 {
                    return Err(ConfigError::InvalidParameter {
                        parameter: "tile_resize_factor".to_string(),
                        value: "0".to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                Operation::Resize {
                    factor: params.tile_resize_factor,
                }
            }
        };
        Ok(op)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved operation with its parameter payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Rolling-ball background subtraction.
    RollingBall {
        /// Ball radius in pixels.
        radius: f32,
    },
    /// Reconstruction background subtraction seeded inside a border.
    Dilate {
        /// Border width.
        box_size: usize,
    },
    /// Reconstruction background subtraction with a lowered seed.
    StaticDilate {
        /// Seed offset.
        seed: SeedLevel,
    },
    /// Global histogram equalisation.
    EqualizeHist {
        /// Histogram bins.
        bins: usize,
    },
    /// CLAHE.
    AdaptiveHist {
        /// Clip limit as a fraction of region area.
        clip: f32,
        /// Contextual region size.
        kernel: Option<usize>,
        /// Histogram bins.
        bins: usize,
    },
    /// Local disk rank equalisation.
    LocalEqualize {
        /// Disk radius.
        radius: usize,
    },
    /// Otsu threshold.
    Otsu,
    /// Gaussian blur.
    GaussianBlur {
        /// Standard deviation.
        sigma: f32,
    },
    /// Gamma correction.
    Gamma {
        /// Exponent.
        gamma: f32,
    },
    /// Logarithmic correction.
    LogCorrection {
        /// Gain.
        gain: f32,
    },
    /// Linear rescale.
    Rescale {
        /// Output range.
        range: (Pixel, Pixel),
    },
    /// Percentile stretch.
    Stretch {
        /// Lower and upper percentiles.
        percentiles: (f32, f32),
    },
    /// Area downscale.
    Resize {
        /// Integer factor.
        factor: usize,
    },
}

impl Operation {
    /// Kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::RollingBall { .. } => OperationKind::RollingBall,
            Operation::Dilate { .. } => OperationKind::Dilate,
            Operation::StaticDilate { .. } => OperationKind::StaticDilate,
            Operation::EqualizeHist { .. } => OperationKind::EqualizeHist,
            Operation::AdaptiveHist { .. } => OperationKind::AdaptiveHist,
            Operation::LocalEqualize { .. } => OperationKind::LocalEqualize,
            Operation::Otsu => OperationKind::Otsu,
            Operation::GaussianBlur { .. } => OperationKind::GaussianBlur,
            Operation::Gamma { .. } => OperationKind::Gamma,
            Operation::LogCorrection { .. } => OperationKind::LogCorrection,
            Operation::Rescale { .. } => OperationKind::Rescale,
            Operation::Stretch { .. } => OperationKind::Stretch,
            Operation::Resize { .. } => OperationKind::Resize,
        }
    }

    /// Configuration name.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether this operation changes the plane extent.
    pub fn is_resize(&self) -> bool {
        matches!(self, Operation::Resize { factor } if *factor > 1)
    }

    /// Extent of the output for an input of the given extent.
    pub fn output_extent(&self, extent: (usize, usize)) -> Result<(usize, usize), ShapeError> {
        match self {
            Operation::Resize { factor } => resize::downscaled_extent(extent, *factor),
            _ => Ok(extent),
        }
    }

    /// Apply to one plane.
    pub fn apply(&self, plane: &Plane) -> Result<Plane, OperationError> {
        match self {
            Operation::RollingBall { radius } => Ok(background::rolling_ball(plane, *radius)),
            Operation::Dilate { box_size } => Ok(morphology::box_dilation(plane, *box_size)),
            Operation::StaticDilate { seed } => morphology::static_dilation(plane, *seed),
            Operation::EqualizeHist { bins } => histogram::equalize_hist(plane, *bins),
            Operation::AdaptiveHist { clip, kernel, bins } => {
                histogram::clahe(plane, *clip, *kernel, *bins)
            }
            Operation::LocalEqualize { radius } => Ok(histogram::local_equalize(plane, *radius)),
            Operation::Otsu => threshold::otsu(plane),
            Operation::GaussianBlur { sigma } => Ok(blur::gaussian_blur(plane, *sigma)),
            Operation::Gamma { gamma } => intensity::gamma(plane, *gamma),
            Operation::LogCorrection { gain } => intensity::log_correction(plane, *gain),
            Operation::Rescale { range } => Ok(intensity::rescale(plane, *range)),
            Operation::Stretch { percentiles } => Ok(intensity::stretch(plane, *percentiles)),
            Operation::Resize { factor } => resize::area_downscale(plane, *factor),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::RollingBall { radius } => write!(f, "ball(r={})", radius),
            Operation::Dilate { box_size } => write!(f, "dilate(box={})", box_size),
            Operation::StaticDilate { seed } => write!(f, "dilate_s(h={})", seed),
            Operation::GaussianBlur { sigma } => write!(f, "blur(sigma={})", sigma),
            Operation::Gamma { gamma } => write!(f, "gamma({})", gamma),
            Operation::Resize { factor } => write!(f, "resize(1/{})", factor),
            other => f.write_str(other.name()),
        }
    }
}

/// Ordered operations applied left to right to one plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpChain {
    ops: Vec<Operation>,
}

impl OpChain {
    /// Create a chain from resolved operations.
    pub fn new(ops: Vec<Operation>) -> Self {
        Self { ops }
    }

    /// The empty (identity) chain.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Operations in application order.
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Iterate operations in application order.
    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.ops.iter()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the chain is the identity.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operation names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.ops.iter().map(Operation::name).collect()
    }

    /// Number of extent-changing operations in the chain.
    pub fn resize_depth(&self) -> usize {
        self.ops.iter().filter(|op| op.is_resize()).count()
    }

    /// Output extent for an input of the given extent.
    pub fn output_extent(&self, extent: (usize, usize)) -> Result<(usize, usize), ShapeError> {
        self.ops
            .iter()
            .try_fold(extent, |extent, op| op.output_extent(extent))
    }

    /// Chain made of only the extent-changing operations, in order.
    pub fn resize_only(&self) -> OpChain {
        OpChain::new(self.ops.iter().filter(|op| op.is_resize()).cloned().collect())
    }
}

impl fmt::Display for OpChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return f.write_str("[]");
        }
        let parts: Vec<String> = self.ops.iter().map(|op| op.to_string()).collect();
        write!(f, "[{}]", parts.join(" -> "))
    }
}

impl<'a> IntoIterator for &'a OpChain {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
