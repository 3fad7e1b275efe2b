//! Sobel gradient magnitude.

use super::luma::LumaPlane;
use super::NORMALIZE_EPSILON;

const KX: [[f64; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const KY: [[f64; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Gradient magnitude with edge-replicated borders, divided by its maximum.
pub fn sobel_magnitude(plane: &LumaPlane) -> Vec<f64> {
    let mut mag = Vec::with_capacity(plane.len());

    for y in 0..plane.height as isize {
        for x in 0..plane.width as isize {
            let mut gx = 0.0;
            let mut gy = 0.0;
            for (ky, (row_x, row_y)) in KX.iter().zip(KY.iter()).enumerate() {
                for kx in 0..3 {
                    let v = plane.clamped(x + kx as isize - 1, y + ky as isize - 1);
                    gx += v * row_x[kx];
                    gy += v * row_y[kx];
                }
            }
            mag.push((gx * gx + gy * gy).sqrt());
        }
    }

    let max = mag.iter().copied().fold(0.0_f64, f64::max);
    let scale = max + NORMALIZE_EPSILON;
    mag.iter_mut().for_each(|m| *m /= scale);
    mag
}
