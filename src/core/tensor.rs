//! Scene tensors with an explicit axis order.
//!
//! A scene has five logical axes: time (T), channel (C), tile (M), row (Y) and
//! column (X). Readers hand data over in whatever physical order they produce,
//! so every tensor carries its [`AxisOrder`] and reordering is an explicit,
//! checked call to [`SceneTensor::to_order`] rather than a silent convention.

use crate::core::error::ShapeError;
use image::{ImageBuffer, Luma};
use ndarray::{s, Array2, Array5, ArrayView2, ArrayView5, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel type for all intermediate processing.
pub type Pixel = f32;

/// A single 2-D (Y, X) image slice.
pub type Plane = Array2<Pixel>;

/// One logical scene axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    /// Time (T).
    Time,
    /// Channel (C).
    Channel,
    /// Tile (M).
    Tile,
    /// Row (Y).
    Y,
    /// Column (X).
    X,
}

impl Dim {
    /// Single-letter tag.
    pub fn letter(&self) -> char {
        match self {
            Dim::Time => 'T',
            Dim::Channel => 'C',
            Dim::Tile => 'M',
            Dim::Y => 'Y',
            Dim::X => 'X',
        }
    }

    fn from_letter(letter: char) -> Option<Dim> {
        match letter.to_ascii_uppercase() {
            'T' => Some(Dim::Time),
            'C' => Some(Dim::Channel),
            'M' => Some(Dim::Tile),
            'Y' => Some(Dim::Y),
            'X' => Some(Dim::X),
            _ => None,
        }
    }
}

/// Physical ordering of the five scene axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisOrder([Dim; 5]);

impl AxisOrder {
    /// Reader order: (T, C, M, Y, X).
    pub const TCMYX: AxisOrder = AxisOrder([Dim::Time, Dim::Channel, Dim::Tile, Dim::Y, Dim::X]);

    /// Channel-major working order: (C, T, M, Y, X).
    pub const CTMYX: AxisOrder = AxisOrder([Dim::Channel, Dim::Time, Dim::Tile, Dim::Y, Dim::X]);

    /// Create an order from five axes, each named exactly once.
    pub fn new(dims: [Dim; 5]) -> Result<Self, ShapeError> {
        for (i, dim) in dims.iter().enumerate() {
            if dims[i + 1..].contains(dim) {
                return Err(ShapeError::InvalidAxisOrder(
                    dims.iter().map(Dim::letter).collect(),
                ));
            }
        }
        Ok(Self(dims))
    }

    /// Parse a five-letter tag such as `"TCMYX"`.
    pub fn parse(tag: &str) -> Result<Self, ShapeError> {
        let invalid = || ShapeError::InvalidAxisOrder(tag.to_string());
        let dims: Vec<Dim> = tag
            .chars()
            .map(|c| Dim::from_letter(c).ok_or_else(invalid))
            .collect::<Result<_, _>>()?;
        let dims: [Dim; 5] = dims.try_into().map_err(|_| invalid())?;
        Self::new(dims)
    }

    /// The axes in physical order.
    pub fn dims(&self) -> [Dim; 5] {
        self.0
    }

    /// Physical position of a logical axis.
    pub fn position(&self, dim: Dim) -> usize {
        // Constructors guarantee every axis is present.
        self.0.iter().position(|d| *d == dim).unwrap_or(0)
    }

    /// Permutation that reorders data in `self` order into `target` order,
    /// in the form expected by `permuted_axes`.
    pub fn permutation_to(&self, target: &AxisOrder) -> [usize; 5] {
        target.0.map(|dim| self.position(dim))
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dim in &self.0 {
            write!(f, "{}", dim.letter())?;
        }
        Ok(())
    }
}

/// Logical extents of a scene, independent of physical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneShape {
    /// Number of timepoints.
    pub time: usize,
    /// Number of channels.
    pub channels: usize,
    /// Number of tiles.
    pub tiles: usize,
    /// Plane height.
    pub height: usize,
    /// Plane width.
    pub width: usize,
}

impl SceneShape {
    /// Create a new scene shape.
    pub fn new(time: usize, channels: usize, tiles: usize, height: usize, width: usize) -> Self {
        Self {
            time,
            channels,
            tiles,
            height,
            width,
        }
    }

    /// Extent of one logical axis.
    pub fn extent(&self, dim: Dim) -> usize {
        match dim {
            Dim::Time => self.time,
            Dim::Channel => self.channels,
            Dim::Tile => self.tiles,
            Dim::Y => self.height,
            Dim::X => self.width,
        }
    }

    /// Physical shape for a given axis order.
    pub fn in_order(&self, order: &AxisOrder) -> [usize; 5] {
        order.dims().map(|dim| self.extent(dim))
    }

    /// Number of planes (T × C × M).
    pub fn plane_count(&self) -> usize {
        self.time * self.channels * self.tiles
    }
}

impl fmt::Display for SceneShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(T={}, C={}, M={}, Y={}, X={})",
            self.time, self.channels, self.tiles, self.height, self.width
        )
    }
}

/// A 5-D floating point scene tagged with its axis order.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTensor {
    data: Array5<Pixel>,
    order: AxisOrder,
}

impl SceneTensor {
    /// Wrap existing data laid out in `order`.
    pub fn new(data: Array5<Pixel>, order: AxisOrder) -> Self {
        Self { data, order }
    }

    /// Wrap a dynamically-dimensioned array, checking it has five axes.
    pub fn from_dyn(
        data: ndarray::Array<Pixel, IxDyn>,
        order: AxisOrder,
    ) -> Result<Self, ShapeError> {
        let ndim = data.ndim();
        let data = data
            .into_dimensionality()
            .map_err(|_| ShapeError::Dimensionality { got: ndim })?;
        Ok(Self { data, order })
    }

    /// Zero-filled scene of the given logical shape.
    pub fn zeros(shape: SceneShape, order: AxisOrder) -> Self {
        Self {
            data: Array5::zeros(shape.in_order(&order)),
            order,
        }
    }

    /// Build a scene by evaluating `f(t, c, m, y, x)` for every element.
    pub fn from_fn<F>(shape: SceneShape, order: AxisOrder, f: F) -> Self
    where
        F: Fn(usize, usize, usize, usize, usize) -> Pixel,
    {
        let dims = order.dims();
        let data = Array5::from_shape_fn(shape.in_order(&order), |(a, b, c, d, e)| {
            let idx = [a, b, c, d, e];
            let at = |dim: Dim| idx[dims.iter().position(|x| *x == dim).unwrap_or(0)];
            f(
                at(Dim::Time),
                at(Dim::Channel),
                at(Dim::Tile),
                at(Dim::Y),
                at(Dim::X),
            )
        });
        Self { data, order }
    }

    /// Physical axis order of the data.
    pub fn order(&self) -> AxisOrder {
        self.order
    }

    /// Borrow the raw data in physical order.
    pub fn data(&self) -> &Array5<Pixel> {
        &self.data
    }

    /// Take the raw data in physical order.
    pub fn into_data(self) -> Array5<Pixel> {
        self.data
    }

    /// Extent of one logical axis.
    pub fn extent(&self, dim: Dim) -> usize {
        self.data.shape()[self.order.position(dim)]
    }

    /// Logical shape.
    pub fn shape(&self) -> SceneShape {
        SceneShape::new(
            self.extent(Dim::Time),
            self.extent(Dim::Channel),
            self.extent(Dim::Tile),
            self.extent(Dim::Y),
            self.extent(Dim::X),
        )
    }

    /// Reorder into `target`, producing standard-layout data.
    pub fn to_order(self, target: AxisOrder) -> SceneTensor {
        if self.order == target {
            return self;
        }
        let perm = self.order.permutation_to(&target);
        let data = self.data.permuted_axes(perm).as_standard_layout().into_owned();
        SceneTensor {
            data,
            order: target,
        }
    }

    /// View the data in `target` order without copying.
    pub fn view_as(&self, target: AxisOrder) -> ArrayView5<'_, Pixel> {
        let perm = self.order.permutation_to(&target);
        self.data.view().permuted_axes(perm)
    }

    /// View one plane at (time, channel, tile).
    pub fn plane(&self, time: usize, channel: usize, tile: usize) -> ArrayView2<'_, Pixel> {
        let perm = self.order.permutation_to(&AxisOrder::TCMYX);
        self.data
            .view()
            .permuted_axes(perm)
            .slice_move(s![time, channel, tile, .., ..])
    }

    /// Copy one plane into a single-channel float image for external writers.
    pub fn plane_image(
        &self,
        time: usize,
        channel: usize,
        tile: usize,
    ) -> ImageBuffer<Luma<Pixel>, Vec<Pixel>> {
        plane_to_image(&self.plane(time, channel, tile))
    }
}

/// Convert a plane view into a single-channel float image.
pub fn plane_to_image(plane: &ArrayView2<'_, Pixel>) -> ImageBuffer<Luma<Pixel>, Vec<Pixel>> {
    let (height, width) = plane.dim();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        Luma([plane[[y as usize, x as usize]]])
    })
}

/// Convert a single-channel float image into a plane.
pub fn image_to_plane(image: &ImageBuffer<Luma<Pixel>, Vec<Pixel>>) -> Plane {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        image.get_pixel(x as u32, y as u32)[0]
    })
}
