//! Rolling-ball background subtraction.

use crate::core::tensor::{Pixel, Plane};
use ndarray::Array2;

/// Offset inside the ball footprint and the ball's height deficit there.
struct BallOffset {
    dy: isize,
    dx: isize,
    lift: Pixel,
}

/// Offsets reach at most `max_reach` pixels; anything further lies outside
/// the plane.
fn ball_offsets(radius: f32, max_reach: usize) -> Vec<BallOffset> {
    let reach = (radius.floor() as isize).min(max_reach as isize);
    let r2 = radius * radius;
    let mut offsets = Vec::new();
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let d2 = (dy * dy + dx * dx) as f32;
            if d2 <= r2 {
                offsets.push(BallOffset {
                    dy,
                    dx,
                    lift: radius - (r2 - d2).sqrt(),
                });
            }
        }
    }
    offsets
}

/// Estimate the background by rolling a ball of `radius` under the
/// intensity surface.
pub fn background(plane: &Plane, radius: f32) -> Plane {
    let (height, width) = plane.dim();
    let offsets = ball_offsets(radius, height.max(width).saturating_sub(1));
    Array2::from_shape_fn((height, width), |(y, x)| {
        offsets
            .iter()
            .filter_map(|o| {
                let yy = y as isize + o.dy;
                let xx = x as isize + o.dx;
                if yy < 0 || xx < 0 || yy >= height as isize || xx >= width as isize {
                    None
                } else {
                    Some(plane[[yy as usize, xx as usize]] + o.lift)
                }
            })
            .fold(Pixel::INFINITY, Pixel::min)
    })
}

/// Subtract the rolling-ball background.
pub fn rolling_ball(plane: &Plane, radius: f32) -> Plane {
    plane - &background(plane, radius)
}
