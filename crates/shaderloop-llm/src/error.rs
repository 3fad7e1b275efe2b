//! Error types for shaderloop-llm

use shaderloop_core::{CriticError, ProposalError};
use thiserror::Error;

/// Errors raised while talking to a chat-completions endpoint.
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key configured
    #[error("OPENAI_API_KEY not set")]
    MissingApiKey,

    /// Vision calls switched off by configuration
    #[error("vision disabled by VISION_DISABLED")]
    VisionDisabled,

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status from the endpoint
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response carried no message content
    #[error("response contained no content")]
    EmptyResponse,

    /// Content did not contain the expected JSON object
    #[error("invalid model output: {0}")]
    InvalidOutput(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encoding error
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

impl From<LlmError> for ProposalError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey | LlmError::VisionDisabled => {
                ProposalError::NotConfigured(err.to_string())
            }
            LlmError::Http(_) | LlmError::Status { .. } | LlmError::Image(_) => {
                ProposalError::Transport(err.to_string())
            }
            LlmError::EmptyResponse | LlmError::InvalidOutput(_) | LlmError::Json(_) => {
                ProposalError::Malformed(err.to_string())
            }
        }
    }
}

impl From<LlmError> for CriticError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey | LlmError::VisionDisabled => {
                CriticError::Disabled(err.to_string())
            }
            LlmError::EmptyResponse => CriticError::Empty,
            other => CriticError::Transport(other.to_string()),
        }
    }
}

/// Result type for shaderloop-llm operations
pub type Result<T> = std::result::Result<T, LlmError>;
