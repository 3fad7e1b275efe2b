//! Centred 2D Fourier magnitude spectrum.
//!
//! The working resolution is a power of two, so a radix-2 Cooley-Tukey FFT
//! is applied to rows and then columns.

use std::f64::consts::PI;

use super::luma::LumaPlane;
use super::NORMALIZE_EPSILON;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    const ZERO: Complex = Complex { re: 0.0, im: 0.0 };
    const ONE: Complex = Complex { re: 1.0, im: 0.0 };

    fn add(self, o: Complex) -> Complex {
        Complex {
            re: self.re + o.re,
            im: self.im + o.im,
        }
    }

    fn sub(self, o: Complex) -> Complex {
        Complex {
            re: self.re - o.re,
            im: self.im - o.im,
        }
    }

    fn mul(self, o: Complex) -> Complex {
        Complex {
            re: self.re * o.re - self.im * o.im,
            im: self.re * o.im + self.im * o.re,
        }
    }

    fn norm(self) -> f64 {
        self.re.hypot(self.im)
    }
}

/// In-place forward FFT. `buf.len()` must be a power of two.
fn fft(buf: &mut [Complex]) {
    let n = buf.len();
    if n <= 1 {
        return;
    }
    debug_assert!(n.is_power_of_two());

    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            buf.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let angle = -2.0 * PI / len as f64;
        let step = Complex {
            re: angle.cos(),
            im: angle.sin(),
        };
        let half = len / 2;
        for start in (0..n).step_by(len) {
            let mut w = Complex::ONE;
            for k in 0..half {
                let u = buf[start + k];
                let v = buf[start + k + half].mul(w);
                buf[start + k] = u.add(v);
                buf[start + k + half] = u.sub(v);
                w = w.mul(step);
            }
        }
        len <<= 1;
    }
}

/// Magnitude of the 2D DFT, zero frequency moved to the centre, divided by
/// its maximum.
pub fn magnitude_spectrum(plane: &LumaPlane) -> Vec<f64> {
    let (w, h) = (plane.width, plane.height);
    let mut grid: Vec<Complex> = plane
        .data
        .iter()
        .map(|&re| Complex { re, im: 0.0 })
        .collect();

    for row in grid.chunks_mut(w) {
        fft(row);
    }

    let mut column = vec![Complex::ZERO; h];
    for x in 0..w {
        for y in 0..h {
            column[y] = grid[y * w + x];
        }
        fft(&mut column);
        for y in 0..h {
            grid[y * w + x] = column[y];
        }
    }

    // fftshift: index 0 moves to n/2 along both axes
    let mut shifted = vec![0.0; w * h];
    for y in 0..h {
        let sy = (y + h / 2) % h;
        for x in 0..w {
            let sx = (x + w / 2) % w;
            shifted[sy * w + sx] = grid[y * w + x].norm();
        }
    }

    let max = shifted.iter().copied().fold(0.0_f64, f64::max);
    let scale = max + NORMALIZE_EPSILON;
    shifted.iter_mut().for_each(|m| *m /= scale);
    shifted
}
