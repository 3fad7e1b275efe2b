//! Run configuration.
//!
//! Validated once before a run starts; a run never fails after validation.

use serde::{Deserialize, Serialize};

use crate::domain::{ConfigError, ScoreWeights};

/// Upper bound on frames rendered per iteration.
pub const MAX_FRAME_COUNT: u32 = 30;

/// Default square output size of rendered frames.
pub const DEFAULT_RESOLUTION: (u32, u32) = (256, 256);

fn default_iteration_count() -> u32 {
    5
}

fn default_frame_count() -> u32 {
    1
}

fn default_resolution() -> (u32, u32) {
    DEFAULT_RESOLUTION
}

fn default_discovery() -> bool {
    true
}

/// Settings that shape one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default = "default_iteration_count")]
    pub iteration_count: u32,

    /// Frames rendered per iteration at evenly spaced times in `[0, 1)`.
    #[serde(default = "default_frame_count")]
    pub frame_count: u32,

    #[serde(default)]
    pub weights: ScoreWeights,

    /// Render size `(width, height)`.
    #[serde(default = "default_resolution")]
    pub resolution: (u32, u32),

    /// Ask the critic for an upfront analysis of the target.
    #[serde(default = "default_discovery")]
    pub discovery: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iteration_count: default_iteration_count(),
            frame_count: default_frame_count(),
            weights: ScoreWeights::default(),
            resolution: default_resolution(),
            discovery: default_discovery(),
        }
    }
}

impl RunConfig {
    pub fn new(iteration_count: u32, frame_count: u32, weights: ScoreWeights) -> Self {
        Self {
            iteration_count,
            frame_count,
            weights,
            ..Self::default()
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = (width, height);
        self
    }

    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discovery = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iteration_count == 0 {
            return Err(ConfigError::NoIterations);
        }
        if self.frame_count == 0 || self.frame_count > MAX_FRAME_COUNT {
            return Err(ConfigError::FrameCountOutOfRange {
                got: self.frame_count,
                max: MAX_FRAME_COUNT,
            });
        }
        let (w, h) = self.resolution;
        if w == 0 || h == 0 {
            return Err(ConfigError::InvalidResolution {
                width: w,
                height: h,
            });
        }
        self.weights.validate()
    }
}
