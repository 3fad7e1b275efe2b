//! Rendered frames.

use std::sync::Arc;

use image::{Rgb, RgbImage};

/// One rendered raster image plus the time parameter used to produce it.
///
/// The pixel buffer is reference counted so frames can be handed to the
/// selector, scorer, critic and artifact store without copying.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    time: f32,
}

impl Frame {
    pub fn new(image: RgbImage, time: f32) -> Self {
        Self {
            image: Arc::new(image),
            time,
        }
    }

    pub fn from_shared(image: Arc<RgbImage>, time: f32) -> Self {
        Self { image, time }
    }

    /// Solid black frame, used as the last-resort render floor.
    pub fn blank(width: u32, height: u32, time: f32) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])), time)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn shared_image(&self) -> Arc<RgbImage> {
        Arc::clone(&self.image)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Time parameter for frame `index` of `count`: `index / count`.
    pub fn time_for(index: u32, count: u32) -> f32 {
        index as f32 / count.max(1) as f32
    }
}
