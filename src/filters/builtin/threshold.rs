//! Otsu thresholding into a binary region map.

use crate::core::error::OperationError;
use crate::core::tensor::Plane;
use crate::filters::builtin::quantize;
use imageproc::contrast::otsu_level;
use ndarray::Array2;

/// Threshold at the Otsu level of the 8-bit quantised plane.
///
/// Pixels above the level become 1.0, the rest 0.0. A uniform plane has no
/// class separation and is rejected.
pub fn otsu(plane: &Plane) -> Result<Plane, OperationError> {
    let (lo, hi) =
        quantize::min_max(plane).ok_or(OperationError::EmptyPlane { operation: "otsu" })?;
    if hi <= lo {
        return Err(OperationError::UniformPlane {
            operation: "otsu",
            value: lo,
        });
    }
    let gray = quantize::to_gray8(plane);
    let level = otsu_level(&gray);
    let (height, width) = plane.dim();
    Ok(Array2::from_shape_fn((height, width), |(y, x)| {
        if gray.get_pixel(x as u32, y as u32)[0] > level {
            1.0
        } else {
            0.0
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bimodal_split() {
        let plane = Plane::from_shape_fn((10, 10), |(_, x)| if x < 5 { 0.1 } else { 0.9 });
        let out = otsu(&plane).unwrap();
        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[9, 9]], 1.0);
        assert_eq!(out.sum(), 50.0);
    }

    #[test]
    fn test_uniform_plane_is_rejected() {
        let err = otsu(&Plane::from_elem((4, 4), 0.3)).unwrap_err();
        assert!(matches!(err, OperationError::UniformPlane { operation: "otsu", .. }));
        assert!(otsu(&Plane::zeros((0, 3))).is_err());
    }
}
