//! Mosaic stitching.
//!
//! Lays the M tiles of every (time, channel) pair out on a row-major grid and
//! concatenates them into one plane. Tile `i` lands at grid cell
//! `(i / cols, i % cols)`.

use crate::core::config::PipelineConfig;
use crate::core::error::{ConfigError, ConfigResult, PipelineResult, ShapeError};
use crate::core::tensor::{AxisOrder, Pixel, Plane, SceneTensor};
use crate::core::types::GridShape;
use crate::filters::builtin::{intensity, resize};
use ndarray::{s, Array5, ArrayView3, Axis};

/// Reassembles tile grids into mosaics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicStitcher {
    grid: GridShape,
    resize_factor: usize,
    rescale: bool,
}

impl MosaicStitcher {
    /// Stitcher for `grid` with no resize and no rescale.
    pub fn new(grid: GridShape) -> Self {
        Self {
            grid,
            resize_factor: 1,
            rescale: false,
        }
    }

    /// Downscale each mosaic by `factor` after assembly.
    pub fn with_resize_factor(mut self, factor: usize) -> Self {
        self.resize_factor = factor.max(1);
        self
    }

    /// Rescale each mosaic to [0, 1] after assembly.
    pub fn with_rescale(mut self, rescale: bool) -> Self {
        self.rescale = rescale;
        self
    }

    /// Stitcher described by a config, or `None` when no grid is set.
    pub fn from_config(config: &PipelineConfig) -> Option<Self> {
        config.grid_shape.map(|grid| {
            Self::new(grid)
                .with_resize_factor(config.quilt_resize_factor)
                .with_rescale(config.rescale_on_stitch)
        })
    }

    /// Grid shape.
    pub fn grid(&self) -> GridShape {
        self.grid
    }

    /// Check the grid against a tile count.
    pub fn check(&self, tiles: usize) -> ConfigResult<()> {
        if self.grid.tile_count() != tiles {
            return Err(ConfigError::GridShapeMismatch {
                grid: self.grid,
                tiles,
            });
        }
        Ok(())
    }

    /// Stitch every (time, channel) tile set of `scene`.
    ///
    /// The output has a tile extent of 1 and keeps the input's axis order.
    /// Rescaling, when enabled, is applied to each mosaic on its own.
    pub fn stitch(&self, scene: &SceneTensor) -> PipelineResult<SceneTensor> {
        let shape = scene.shape();
        self.check(shape.tiles)?;

        let mosaic_extent = (self.grid.rows * shape.height, self.grid.cols * shape.width);
        let (height, width) = resize::downscaled_extent(mosaic_extent, self.resize_factor)?;
        log::debug!(
            "Stitching {} tiles of {}x{} on a {} grid into {}x{}",
            shape.tiles,
            shape.height,
            shape.width,
            self.grid,
            height,
            width
        );

        let view = scene.view_as(AxisOrder::TCMYX);
        let mut out = Array5::<Pixel>::zeros((shape.time, shape.channels, 1, height, width));
        for t in 0..shape.time {
            for c in 0..shape.channels {
                let tiles = view.slice(s![t, c, .., .., ..]);
                let mut mosaic = montage(tiles, self.grid);
                if self.resize_factor > 1 {
                    mosaic = resize::area_downscale(&mosaic, self.resize_factor).map_err(|_| {
                        ShapeError::ResizeCollapse {
                            factor: self.resize_factor,
                            extent: mosaic_extent.0.min(mosaic_extent.1),
                        }
                    })?;
                }
                if self.rescale {
                    mosaic = intensity::rescale(&mosaic, (0.0, 1.0));
                }
                out.slice_mut(s![t, c, 0, .., ..]).assign(&mosaic);
            }
        }

        Ok(SceneTensor::new(out, AxisOrder::TCMYX).to_order(scene.order()))
    }
}

/// Concatenate `(M, Y, X)` tiles into one `(rows * Y, cols * X)` plane.
///
/// Expects `tiles.len_of(Axis(0)) == grid.tile_count()`; surplus tiles are
/// ignored and missing cells stay zero.
pub fn montage(tiles: ArrayView3<'_, Pixel>, grid: GridShape) -> Plane {
    let (_, tile_h, tile_w) = tiles.dim();
    let mut mosaic = Plane::zeros((grid.rows * tile_h, grid.cols * tile_w));
    let count = tiles.len_of(Axis(0)).min(grid.tile_count());
    for (index, tile) in tiles.outer_iter().take(count).enumerate() {
        let (row, col) = grid.position(index);
        let (y, x) = (row * tile_h, col * tile_w);
        mosaic
            .slice_mut(s![y..y + tile_h, x..x + tile_w])
            .assign(&tile);
    }
    mosaic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PipelineError;
    use crate::core::tensor::SceneShape;

    fn tiled(shape: SceneShape) -> SceneTensor {
        SceneTensor::from_fn(shape, AxisOrder::TCMYX, |t, c, m, y, x| {
            (t * 1000 + c * 100 + m) as Pixel + (y + x) as Pixel * 0.001
        })
    }

    #[test]
    fn test_three_by_three_grid() {
        let scene = tiled(SceneShape::new(1, 1, 9, 100, 100));
        let stitched = MosaicStitcher::new(GridShape::new(3, 3))
            .stitch(&scene)
            .unwrap();

        assert_eq!(stitched.shape(), SceneShape::new(1, 1, 1, 300, 300));
        let mosaic = stitched.plane(0, 0, 0);
        let block = mosaic.slice(s![100..200, 100..200]);
        assert_eq!(block, scene.plane(0, 0, 4));
        assert_eq!(mosaic[[0, 299]].floor(), 2.0);
        assert_eq!(mosaic[[299, 0]].floor(), 6.0);
    }

    #[test]
    fn test_non_square_grid_is_row_major() {
        let scene = tiled(SceneShape::new(1, 1, 6, 2, 3));
        let stitched = MosaicStitcher::new(GridShape::new(2, 3))
            .stitch(&scene)
            .unwrap();
        let mosaic = stitched.plane(0, 0, 0);
        assert_eq!(mosaic.dim(), (4, 9));
        // tile 5 sits at row 1, col 2
        assert_eq!(mosaic[[2, 6]], 5.0);
        assert_eq!(mosaic[[0, 3]], 1.0);
    }

    #[test]
    fn test_grid_mismatch_fails_before_work() {
        let scene = tiled(SceneShape::new(1, 2, 9, 4, 4));
        let err = MosaicStitcher::new(GridShape::new(2, 2))
            .stitch(&scene)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::GridShapeMismatch { tiles: 9, .. })
        ));
    }

    #[test]
    fn test_resize_and_rescale_per_mosaic() {
        let scene = tiled(SceneShape::new(2, 2, 4, 6, 6));
        let stitched = MosaicStitcher::new(GridShape::new(2, 2))
            .with_resize_factor(3)
            .with_rescale(true)
            .stitch(&scene)
            .unwrap();

        assert_eq!(stitched.shape(), SceneShape::new(2, 2, 1, 4, 4));
        for t in 0..2 {
            for c in 0..2 {
                let mosaic = stitched.plane(t, c, 0);
                let min = mosaic.fold(f32::MAX, |a, &b| a.min(b));
                let max = mosaic.fold(f32::MIN, |a, &b| a.max(b));
                assert!(min.abs() < 1e-6);
                assert!((max - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_keeps_axis_order() {
        let scene = tiled(SceneShape::new(2, 3, 4, 2, 2)).to_order(AxisOrder::CTMYX);
        let stitched = MosaicStitcher::new(GridShape::new(1, 4))
            .stitch(&scene)
            .unwrap();
        assert_eq!(stitched.order(), AxisOrder::CTMYX);
        assert_eq!(stitched.shape(), SceneShape::new(2, 3, 1, 2, 8));
        assert_eq!(stitched.plane(1, 2, 0)[[0, 6]], 1203.0);
    }

    #[test]
    fn test_from_config() {
        assert!(MosaicStitcher::from_config(&PipelineConfig::new()).is_none());
        let config = PipelineConfig::new()
            .with_grid_shape(2, 5)
            .with_quilt_resize_factor(2)
            .with_rescale_on_stitch(true);
        let stitcher = MosaicStitcher::from_config(&config).unwrap();
        assert_eq!(stitcher.grid(), GridShape::new(2, 5));
        assert!(stitcher.check(10).is_ok());
        assert!(stitcher.check(9).is_err());
    }
}
