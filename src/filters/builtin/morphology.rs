//! Greyscale reconstruction by dilation and the two dilation-based
//! background removals built on it.
//!
//! Reconstruction uses the hybrid raster-scan/queue algorithm with
//! 8-connectivity: one forward and one backward raster pass settle most
//! pixels, and a FIFO queue propagates whatever remains.

use crate::core::config::SeedLevel;
use crate::core::error::OperationError;
use crate::core::tensor::{Pixel, Plane};
use crate::filters::builtin::quantize;
use ndarray::s;
use std::collections::VecDeque;

const FORWARD: [(isize, isize); 4] = [(-1, -1), (-1, 0), (-1, 1), (0, -1)];
const BACKWARD: [(isize, isize); 4] = [(1, 1), (1, 0), (1, -1), (0, 1)];

fn neighbour(
    y: usize,
    x: usize,
    (dy, dx): (isize, isize),
    height: usize,
    width: usize,
) -> Option<(usize, usize)> {
    let yy = y as isize + dy;
    let xx = x as isize + dx;
    if yy < 0 || xx < 0 || yy >= height as isize || xx >= width as isize {
        None
    } else {
        Some((yy as usize, xx as usize))
    }
}

/// Reconstruct `mask` by dilating `seed` under it.
///
/// The seed is clipped to the mask first, so the result never exceeds the mask.
pub fn reconstruct_by_dilation(seed: &Plane, mask: &Plane) -> Plane {
    let (height, width) = mask.dim();
    let mut marker = Plane::from_shape_fn((height, width), |(y, x)| {
        seed[[y, x]].min(mask[[y, x]])
    });

    for y in 0..height {
        for x in 0..width {
            let mut value = marker[[y, x]];
            for offset in FORWARD {
                if let Some(q) = neighbour(y, x, offset, height, width) {
                    value = value.max(marker[q]);
                }
            }
            marker[[y, x]] = value.min(mask[[y, x]]);
        }
    }

    let mut queue = VecDeque::new();
    for y in (0..height).rev() {
        for x in (0..width).rev() {
            let mut value = marker[[y, x]];
            for offset in BACKWARD {
                if let Some(q) = neighbour(y, x, offset, height, width) {
                    value = value.max(marker[q]);
                }
            }
            let value = value.min(mask[[y, x]]);
            marker[[y, x]] = value;
            let unsettled = BACKWARD.iter().any(|&offset| {
                neighbour(y, x, offset, height, width)
                    .map(|q| marker[q] < value && marker[q] < mask[q])
                    .unwrap_or(false)
            });
            if unsettled {
                queue.push_back((y, x));
            }
        }
    }

    while let Some((y, x)) = queue.pop_front() {
        let value = marker[[y, x]];
        for offset in FORWARD.iter().chain(BACKWARD.iter()) {
            if let Some(q) = neighbour(y, x, *offset, height, width) {
                if marker[q] < value && marker[q] != mask[q] {
                    marker[q] = value.min(mask[q]);
                    queue.push_back(q);
                }
            }
        }
    }

    marker
}

/// Subtract a reconstruction seeded with the plane minimum everywhere except
/// a border of `box_size` pixels.
pub fn box_dilation(plane: &Plane, box_size: usize) -> Plane {
    let (height, width) = plane.dim();
    let mut seed = plane.clone();
    if box_size > 0 && 2 * box_size < height && 2 * box_size < width {
        if let Some(min) = quantize::min_value(plane) {
            seed.slice_mut(s![box_size..height - box_size, box_size..width - box_size])
                .fill(min);
        }
    }
    plane - &reconstruct_by_dilation(&seed, plane)
}

/// Subtract a reconstruction seeded with the plane lowered by `level`.
pub fn static_dilation(plane: &Plane, level: SeedLevel) -> Result<Plane, OperationError> {
    let h: Pixel = match level {
        SeedLevel::Fixed(h) => h,
        SeedLevel::MedianOfImage => {
            let median = quantize::median(plane).unwrap_or(0.0);
            if median < 0.0 {
                return Err(OperationError::NegativeSeed {
                    operation: "dilate_s",
                    level: median,
                });
            }
            median
        }
    };
    let seed = plane.mapv(|v| v - h);
    Ok(plane - &reconstruct_by_dilation(&seed, plane))
}
