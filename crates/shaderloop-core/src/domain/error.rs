//! Domain-level error taxonomy for shaderloop.
//!
//! Only configuration and setup problems surface as [`LoopError`]. Failures of
//! external collaborators during a run are converted to fallback values by the
//! orchestrator and never reach the caller.

/// Errors produced while validating weights or a run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("iteration_count must be at least 1")]
    NoIterations,

    #[error("frame_count must be between 1 and {max}, got {got}")]
    FrameCountOutOfRange { got: u32, max: u32 },

    #[error("weight {name} must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("unknown weight key: {0}")]
    UnknownWeight(String),

    #[error("working resolution must be a power of two >= 8, got {0}")]
    InvalidWorkingSize(u32),

    #[error("render resolution must be non-empty, got {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
}

/// Shaderloop domain errors.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("target image unavailable: {0}")]
    TargetUnavailable(String),

    #[error("run produced no iterations")]
    EmptyRun,
}

/// Result type for shaderloop domain operations.
pub type Result<T> = std::result::Result<T, LoopError>;
