//! Intensity statistics and quantisation helpers shared by the kernels.

use crate::core::tensor::{Pixel, Plane};
use image::{GrayImage, Luma};
use ndarray::Array2;

/// Minimum and maximum intensity, or `None` for an empty plane.
pub fn min_max(plane: &Plane) -> Option<(Pixel, Pixel)> {
    let mut iter = plane.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// Minimum intensity, or `None` for an empty plane.
pub fn min_value(plane: &Plane) -> Option<Pixel> {
    min_max(plane).map(|(lo, _)| lo)
}

/// Sorted copy of the plane's intensities.
pub fn sorted_values(plane: &Plane) -> Vec<Pixel> {
    let mut values: Vec<Pixel> = plane.iter().copied().collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Percentile `p` (0-100) of sorted values with linear interpolation
/// between closest ranks.
pub fn percentile(sorted: &[Pixel], p: f32) -> Option<Pixel> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) as f64 / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = (rank - lower as f64) as Pixel;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Median intensity.
pub fn median(plane: &Plane) -> Option<Pixel> {
    percentile(&sorted_values(plane), 50.0)
}

/// Quantise a plane onto `levels` integer levels spanning its own
/// [min, max] range. A flat plane maps to level 0.
pub fn to_levels(plane: &Plane, levels: usize) -> Array2<u16> {
    let top = levels.saturating_sub(1) as f32;
    match min_max(plane) {
        Some((lo, hi)) if hi > lo => {
            let scale = top / (hi - lo);
            plane.mapv(|v| ((v - lo) * scale).round().clamp(0.0, top) as u16)
        }
        _ => Array2::zeros(plane.raw_dim()),
    }
}

/// Quantise a plane into an 8-bit grayscale image.
pub fn to_gray8(plane: &Plane) -> GrayImage {
    let levels = to_levels(plane, 256);
    let (height, width) = levels.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([levels[[y as usize, x as usize]] as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_min_max() {
        let plane = array![[3.0, -1.0], [7.5, 2.0]];
        assert_eq!(min_max(&plane), Some((-1.0, 7.5)));
        assert_eq!(min_max(&Plane::zeros((0, 4))), None);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 0.0), Some(0.0));
        assert_eq!(percentile(&sorted, 100.0), Some(40.0));
        assert_eq!(percentile(&sorted, 50.0), Some(20.0));
        assert!((percentile(&sorted, 10.0).unwrap() - 4.0).abs() < 1e-5);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_median() {
        let plane = array![[4.0, 1.0], [3.0, 2.0]];
        assert_eq!(median(&plane), Some(2.5));
    }

    #[test]
    fn test_to_gray8_spans_full_range() {
        let plane = array![[0.5, 1.0], [1.5, 2.5]];
        let gray = to_gray8(&plane);
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(1, 1)[0], 255);

        let flat = to_gray8(&Plane::from_elem((2, 2), 4.0));
        assert!(flat.pixels().all(|p| p[0] == 0));
    }
}
