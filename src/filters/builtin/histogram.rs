//! Histogram equalisation: global, adaptive (CLAHE) and local rank.

use crate::core::error::OperationError;
use crate::core::tensor::{Pixel, Plane};
use crate::filters::builtin::quantize;
use ndarray::Array2;

/// Global histogram equalisation onto [0, 1].
///
/// The CDF is sampled at bin centres and intensities are mapped by linear
/// interpolation between them.
pub fn equalize_hist(plane: &Plane, bins: usize) -> Result<Plane, OperationError> {
    let non_finite = plane.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        return Err(OperationError::NonFiniteIntensity {
            operation: "eq_hist",
            count: non_finite,
        });
    }
    let (mut lo, mut hi) =
        quantize::min_max(plane).ok_or(OperationError::EmptyPlane { operation: "eq_hist" })?;
    if hi <= lo {
        lo -= 0.5;
        hi += 0.5;
    }
    let bins = bins.max(2);
    let width = (hi - lo) as f64 / bins as f64;

    let mut counts = vec![0u64; bins];
    for &v in plane.iter() {
        let bin = (((v - lo) as f64 / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    let total = plane.len() as f64;
    let mut running = 0u64;
    let cdf: Vec<f64> = counts
        .iter()
        .map(|&c| {
            running += c;
            running as f64 / total
        })
        .collect();
    let centres: Vec<f64> = (0..bins)
        .map(|i| lo as f64 + width * (i as f64 + 0.5))
        .collect();

    Ok(plane.mapv(|v| interpolate(v as f64, &centres, &cdf) as Pixel))
}

/// Piecewise-linear interpolation clamped to the end values.
fn interpolate(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    if x.is_nan() {
        return ys[0];
    }
    let upper = xs.partition_point(|&p| p <= x).clamp(1, last);
    let lower = upper - 1;
    let t = (x - xs[lower]) / (xs[upper] - xs[lower]);
    ys[lower] + t * (ys[upper] - ys[lower])
}

/// Contrast-limited adaptive histogram equalisation onto [0, 1].
///
/// The plane is normalised, split into contextual regions of `kernel` pixels
/// (1/8 of each extent when `None`), each region's histogram is clipped at
/// `clip` of its area with the excess redistributed uniformly, and pixels
/// are mapped by bilinear interpolation between the four nearest regions.
pub fn clahe(
    plane: &Plane,
    clip: f32,
    kernel: Option<usize>,
    bins: usize,
) -> Result<Plane, OperationError> {
    let (height, width) = plane.dim();
    if plane.is_empty() {
        return Err(OperationError::EmptyPlane { operation: "ada_hist" });
    }
    let bins = bins.max(2);
    let levels = quantize::to_levels(plane, bins);

    let kernel_y = kernel.unwrap_or(height / 8).clamp(1, height);
    let kernel_x = kernel.unwrap_or(width / 8).clamp(1, width);
    let regions_y = height.div_ceil(kernel_y);
    let regions_x = width.div_ceil(kernel_x);

    let mut maps = Vec::with_capacity(regions_y * regions_x);
    for ry in 0..regions_y {
        for rx in 0..regions_x {
            let y0 = ry * kernel_y;
            let x0 = rx * kernel_x;
            let y1 = (y0 + kernel_y).min(height);
            let x1 = (x0 + kernel_x).min(width);
            let region = levels.slice(ndarray::s![y0..y1, x0..x1]);
            maps.push(region_mapping(region.iter().copied(), region.len(), clip, bins));
        }
    }

    let axis = |pos: usize, kernel: usize, regions: usize| -> (usize, usize, f64) {
        let f = (pos as f64 + 0.5) / kernel as f64 - 0.5;
        if f <= 0.0 {
            return (0, 0, 0.0);
        }
        let lower = (f.floor() as usize).min(regions - 1);
        let upper = (lower + 1).min(regions - 1);
        let t = if upper == lower { 0.0 } else { f - lower as f64 };
        (lower, upper, t.clamp(0.0, 1.0))
    };

    Ok(Array2::from_shape_fn((height, width), |(y, x)| {
        let level = levels[[y, x]] as usize;
        let (y0, y1, ty) = axis(y, kernel_y, regions_y);
        let (x0, x1, tx) = axis(x, kernel_x, regions_x);
        let at = |ry: usize, rx: usize| maps[ry * regions_x + rx][level];
        let top = at(y0, x0) * (1.0 - tx) + at(y0, x1) * tx;
        let bottom = at(y1, x0) * (1.0 - tx) + at(y1, x1) * tx;
        (top * (1.0 - ty) + bottom * ty) as Pixel
    }))
}

fn region_mapping(
    levels: impl Iterator<Item = u16>,
    area: usize,
    clip: f32,
    bins: usize,
) -> Vec<f64> {
    let mut hist = vec![0f64; bins];
    for level in levels {
        hist[(level as usize).min(bins - 1)] += 1.0;
    }

    let limit = (clip as f64 * area as f64).max(1.0);
    let mut excess = 0.0;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }
    let share = excess / bins as f64;

    let mut running = 0.0;
    let total = area.max(1) as f64;
    hist.iter()
        .map(|count| {
            running += count + share;
            (running / total).min(1.0)
        })
        .collect()
}

/// Local rank equalisation over a disk of `radius`.
///
/// Each output pixel is the fraction of in-bounds disk neighbours whose
/// 256-level quantised intensity does not exceed the centre's.
pub fn local_equalize(plane: &Plane, radius: usize) -> Plane {
    let (height, width) = plane.dim();
    let levels = quantize::to_levels(plane, 256);
    let r = radius as isize;
    let disk: Vec<(isize, isize)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dy, dx)))
        .filter(|(dy, dx)| dy * dy + dx * dx <= r * r)
        .collect();

    Array2::from_shape_fn((height, width), |(y, x)| {
        let centre = levels[[y, x]];
        let (mut below, mut seen) = (0u32, 0u32);
        for &(dy, dx) in &disk {
            let yy = y as isize + dy;
            let xx = x as isize + dx;
            if yy < 0 || xx < 0 || yy >= height as isize || xx >= width as isize {
                continue;
            }
            seen += 1;
            if levels[[yy as usize, xx as usize]] <= centre {
                below += 1;
            }
        }
        below as Pixel / seen as Pixel
    })
}
