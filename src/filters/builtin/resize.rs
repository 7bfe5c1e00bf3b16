//! Area (block-mean) downscaling by an integer factor.

use crate::core::error::{OperationError, ShapeError};
use crate::core::tensor::{Pixel, Plane};
use ndarray::{s, Array2};

/// Extent after floor-dividing each axis by `factor`.
pub fn downscaled_extent(
    (height, width): (usize, usize),
    factor: usize,
) -> Result<(usize, usize), ShapeError> {
    if factor <= 1 {
        return Ok((height, width));
    }
    let out = (height / factor, width / factor);
    if out.0 == 0 {
        return Err(ShapeError::ResizeCollapse {
            factor,
            extent: height,
        });
    }
    if out.1 == 0 {
        return Err(ShapeError::ResizeCollapse {
            factor,
            extent: width,
        });
    }
    Ok(out)
}

/// Downscale so each output pixel is the mean of one `factor`×`factor` block.
/// Trailing rows and columns that do not fill a block are dropped.
pub fn area_downscale(plane: &Plane, factor: usize) -> Result<Plane, OperationError> {
    let (height, width) = plane.dim();
    if factor <= 1 {
        return Ok(plane.clone());
    }
    let (out_h, out_w) =
        downscaled_extent((height, width), factor).map_err(|_| OperationError::FactorTooLarge {
            operation: "resize",
            factor,
            height,
            width,
        })?;
    let area = (factor * factor) as Pixel;
    Ok(Array2::from_shape_fn((out_h, out_w), |(y, x)| {
        let block = plane.slice(s![
            y * factor..(y + 1) * factor,
            x * factor..(x + 1) * factor
        ]);
        block.sum() / area
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_shape_law() {
        let plane = Plane::zeros((512, 512));
        for factor in [1, 2, 3, 5, 8] {
            let out = area_downscale(&plane, factor).unwrap();
            assert_eq!(out.dim(), (512 / factor, 512 / factor));
        }
    }

    #[test]
    fn test_block_mean() {
        let plane = Plane::from_shape_fn((4, 5), |(y, x)| (y * 5 + x) as f32);
        let out = area_downscale(&plane, 2).unwrap();
        assert_eq!(out.dim(), (2, 2));
        assert_eq!(out[[0, 0]], (0.0 + 1.0 + 5.0 + 6.0) / 4.0);
        assert_eq!(out[[1, 1]], (12.0 + 13.0 + 17.0 + 18.0) / 4.0);
    }

    #[test]
    fn test_factor_one_is_identity() {
        let plane = Plane::from_shape_fn((3, 3), |(y, x)| (y + x) as f32);
        assert_eq!(area_downscale(&plane, 1).unwrap(), plane);
    }

    #[test]
    fn test_collapse() {
        assert!(matches!(
            area_downscale(&Plane::zeros((3, 10)), 4),
            Err(OperationError::FactorTooLarge { factor: 4, .. })
        ));
        assert_eq!(
            downscaled_extent((10, 3), 4),
            Err(ShapeError::ResizeCollapse {
                factor: 4,
                extent: 3
            })
        );
    }
}
