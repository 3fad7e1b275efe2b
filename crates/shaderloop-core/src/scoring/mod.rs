//! Perceptual scoring engine.
//!
//! Two images are reduced to luma at a fixed working resolution and compared
//! through three normalized feature maps:
//! - edge: Sobel gradient magnitude
//! - frequency: centred Fourier magnitude spectrum
//! - texture: Gram matrix of the flattened luma
//!
//! Each pair of maps is compared by mean absolute difference `d`, reported as
//! the similarity `1 - d`, and the three similarities are combined into a
//! weighted composite.
//!
//! The engine is an explicit value owned by the caller. Feature maps of the
//! target can be computed once with [`ScoreEngine::prepare`] and reused for
//! every frame of a run.

pub mod edge;
pub mod luma;
pub mod spectrum;
pub mod texture;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::domain::{ConfigError, ScoreVector, ScoreWeights};

/// Added to a map's maximum before dividing by it.
pub const NORMALIZE_EPSILON: f64 = 1e-6;

/// Default working resolution (square, power of two).
pub const DEFAULT_WORKING_SIZE: u32 = 256;

/// Errors raised when an image cannot be scored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("feature maps were prepared at {expected}px but engine works at {actual}px")]
    ResolutionMismatch { expected: u32, actual: u32 },
}

/// Normalized feature maps of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMaps {
    size: u32,
    edges: Vec<f64>,
    spectrum: Vec<f64>,
    gram: Vec<f64>,
}

impl FeatureMaps {
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn spectrum(&self) -> &[f64] {
        &self.spectrum
    }

    pub fn gram(&self) -> &[f64] {
        &self.gram
    }
}

/// Configuration-free scorer working at a fixed square resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEngine {
    working_size: u32,
}

impl Default for ScoreEngine {
    fn default() -> Self {
        Self {
            working_size: DEFAULT_WORKING_SIZE,
        }
    }
}

impl ScoreEngine {
    /// Create an engine; `working_size` must be a power of two of at least 8.
    pub fn new(working_size: u32) -> Result<Self, ConfigError> {
        if working_size < 8 || !working_size.is_power_of_two() {
            return Err(ConfigError::InvalidWorkingSize(working_size));
        }
        Ok(Self { working_size })
    }

    pub fn working_size(&self) -> u32 {
        self.working_size
    }

    /// Compute the feature maps of one image.
    pub fn prepare(&self, img: &RgbImage) -> Result<FeatureMaps, ScoreError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ScoreError::EmptyImage { width, height });
        }

        let plane = luma::luma_plane(img, self.working_size);
        Ok(FeatureMaps {
            size: self.working_size,
            edges: edge::sobel_magnitude(&plane),
            spectrum: spectrum::magnitude_spectrum(&plane),
            gram: texture::gram_matrix(&[&plane.data]),
        })
    }

    /// Score two images against each other.
    pub fn score(
        &self,
        a: &RgbImage,
        b: &RgbImage,
        weights: &ScoreWeights,
    ) -> Result<ScoreVector, ScoreError> {
        let fa = self.prepare(a)?;
        let fb = self.prepare(b)?;
        self.compare(&fa, &fb, weights)
    }

    /// Score an image against feature maps prepared earlier.
    pub fn score_prepared(
        &self,
        target: &FeatureMaps,
        img: &RgbImage,
        weights: &ScoreWeights,
    ) -> Result<ScoreVector, ScoreError> {
        let maps = self.prepare(img)?;
        self.compare(target, &maps, weights)
    }

    /// Compare two sets of feature maps.
    pub fn compare(
        &self,
        a: &FeatureMaps,
        b: &FeatureMaps,
        weights: &ScoreWeights,
    ) -> Result<ScoreVector, ScoreError> {
        for maps in [a, b] {
            if maps.size != self.working_size {
                return Err(ScoreError::ResolutionMismatch {
                    expected: maps.size,
                    actual: self.working_size,
                });
            }
        }

        let frequency = similarity(&a.spectrum, &b.spectrum);
        let edge = similarity(&a.edges, &b.edges);
        let texture = similarity(&a.gram, &b.gram);
        Ok(ScoreVector::from_similarities(
            frequency, edge, texture, weights,
        ))
    }
}

/// Mean absolute difference between two equally sized maps.
pub fn normalized_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let total: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
    total / a.len() as f64
}

fn similarity(a: &[f64], b: &[f64]) -> f64 {
    (1.0 - normalized_distance(a, b)).clamp(0.0, 1.0)
}
