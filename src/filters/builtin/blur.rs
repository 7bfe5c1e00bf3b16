//! Separable Gaussian blur with reflect boundary handling.

use crate::core::tensor::{Pixel, Plane};
use ndarray::{Array2, Axis};

/// Kernel radius for a given sigma (four standard deviations).
pub fn kernel_radius(sigma: f32) -> usize {
    (4.0 * sigma).round().max(0.0) as usize
}

/// Normalised 1-D Gaussian kernel.
pub fn gaussian_kernel(sigma: f32) -> Vec<Pixel> {
    let radius = kernel_radius(sigma) as isize;
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<Pixel> = (-radius..=radius)
        .map(|i| (-((i * i) as Pixel) / denom).exp())
        .collect();
    let sum: Pixel = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Half-sample symmetric reflection of an index into `0..len`.
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}

fn convolve_axis(plane: &Plane, kernel: &[Pixel], axis: Axis) -> Plane {
    let radius = (kernel.len() / 2) as isize;
    let mut out = Array2::zeros(plane.raw_dim());
    for (src, mut dst) in plane
        .lanes(axis)
        .into_iter()
        .zip(out.lanes_mut(axis).into_iter())
    {
        let len = src.len();
        for i in 0..len {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let j = reflect(i as isize + k as isize - radius, len);
                acc += w * src[j];
            }
            dst[i] = acc;
        }
    }
    out
}

/// Gaussian blur with standard deviation `sigma`.
pub fn gaussian_blur(plane: &Plane, sigma: f32) -> Plane {
    if plane.is_empty() || sigma <= 0.0 {
        return plane.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let rows = convolve_axis(plane, &kernel, Axis(1));
    convolve_axis(&rows, &kernel, Axis(0))
}
