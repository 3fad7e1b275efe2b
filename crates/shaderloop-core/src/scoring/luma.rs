//! Luma planes at a fixed working resolution.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Single-channel image with samples in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl LumaPlane {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample with coordinates clamped to the plane (edge replication).
    pub fn clamped(&self, x: isize, y: isize) -> f64 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.width + cx]
    }
}

/// ITU-R BT.601 luma of an 8-bit RGB pixel, normalized to `[0, 1]`.
pub fn luma(rgb: [u8; 3]) -> f64 {
    let r = rgb[0] as f64 / 255.0;
    let g = rgb[1] as f64 / 255.0;
    let b = rgb[2] as f64 / 255.0;
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Convert to luma, resizing to `size`×`size` first when needed.
pub fn luma_plane(img: &RgbImage, size: u32) -> LumaPlane {
    let resized;
    let source = if img.dimensions() == (size, size) {
        img
    } else {
        resized = imageops::resize(img, size, size, FilterType::Triangle);
        &resized
    };

    let data = source.pixels().map(|p| luma(p.0)).collect();
    LumaPlane {
        width: size as usize,
        height: size as usize,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_luma_endpoints() {
        assert_eq!(luma([0, 0, 0]), 0.0);
        assert!((luma([255, 255, 255]) - 1.0).abs() < 1e-12);
        assert!((luma([255, 0, 0]) - 0.299).abs() < 1e-12);
        assert!((luma([0, 255, 0]) - 0.587).abs() < 1e-12);
        assert!((luma([0, 0, 255]) - 0.114).abs() < 1e-12);
    }

    #[test]
    fn test_plane_resizes_to_working_size() {
        let img = RgbImage::from_pixel(20, 10, Rgb([255, 255, 255]));
        let plane = luma_plane(&img, 16);
        assert_eq!(plane.width, 16);
        assert_eq!(plane.height, 16);
        assert_eq!(plane.len(), 256);
        assert!(plane.data.iter().all(|v| (v - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_clamped_replicates_edges() {
        let plane = LumaPlane {
            width: 2,
            height: 2,
            data: vec![0.1, 0.2, 0.3, 0.4],
        };
        assert_eq!(plane.clamped(-1, -1), 0.1);
        assert_eq!(plane.clamped(5, 0), 0.2);
        assert_eq!(plane.clamped(0, 9), 0.3);
        assert_eq!(plane.clamped(1, 1), 0.4);
    }
}
