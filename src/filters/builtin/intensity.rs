//! Point-wise intensity corrections.

use crate::core::error::OperationError;
use crate::core::tensor::{Pixel, Plane};
use crate::filters::builtin::quantize;

fn require_non_negative(plane: &Plane, operation: &'static str) -> Result<(), OperationError> {
    match quantize::min_value(plane) {
        Some(min) if min < 0.0 => Err(OperationError::NegativeIntensity { operation, min }),
        _ => Ok(()),
    }
}

/// Raise every intensity to `gamma`.
pub fn gamma(plane: &Plane, gamma: f32) -> Result<Plane, OperationError> {
    require_non_negative(plane, "gamma")?;
    Ok(plane.mapv(|v| v.powf(gamma)))
}

/// Logarithmic correction `gain * log2(1 + I)`.
pub fn log_correction(plane: &Plane, gain: f32) -> Result<Plane, OperationError> {
    require_non_negative(plane, "log")?;
    Ok(plane.mapv(|v| gain * (1.0 + v).log2()))
}

/// Map the plane's [min, max] linearly onto [lo, hi]. A flat plane maps to `lo`.
pub fn rescale(plane: &Plane, (lo, hi): (Pixel, Pixel)) -> Plane {
    match quantize::min_max(plane) {
        Some((min, max)) if max > min => {
            let scale = (hi - lo) / (max - min);
            plane.mapv(|v| lo + (v - min) * scale)
        }
        _ => Plane::from_elem(plane.raw_dim(), lo),
    }
}

/// Clip to the given lower/upper percentiles and map that window onto [0, 1].
pub fn stretch(plane: &Plane, (p_lo, p_hi): (f32, f32)) -> Plane {
    let sorted = quantize::sorted_values(plane);
    let bounds = quantize::percentile(&sorted, p_lo).zip(quantize::percentile(&sorted, p_hi));
    match bounds {
        Some((lo, hi)) if hi > lo => {
            let span = hi - lo;
            plane.mapv(|v| (v.clamp(lo, hi) - lo) / span)
        }
        _ => Plane::zeros(plane.raw_dim()),
    }
}
