//! Contracts for the external collaborators the loop drives.
//!
//! - [`Proposer`]: produces candidate source (initial, edit and repair paths)
//! - [`Renderer`]: executes a candidate and returns frames
//! - [`Critic`]: compares target and output images in prose
//! - [`PerceptualMetric`]: optional external rank metric
//!
//! Implementations report failures as typed errors. The orchestrator converts
//! every one of them into a fallback value, so none of these errors can escape
//! a run.

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::domain::{Frame, RankDirection, ScoreVector, ScoreWeights};

/// Critique text substituted whenever the critic cannot answer.
pub const CRITIQUE_UNAVAILABLE: &str = "VLM critique unavailable; using stub critique.";

// ---------------------------------------------------------------------------
// Proposer
// ---------------------------------------------------------------------------

/// Whether an edit should favour structural change or refinement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// First half of the run: large structural changes are welcome.
    Explore,

    /// Second half: keep the structure, refine details.
    Refine,
}

impl Pacing {
    /// `Explore` while `iteration < iteration_count / 2`.
    pub fn for_iteration(iteration: u32, iteration_count: u32) -> Self {
        if (iteration as f64) < iteration_count as f64 / 2.0 {
            Pacing::Explore
        } else {
            Pacing::Refine
        }
    }

    pub fn is_early(self) -> bool {
        self == Pacing::Explore
    }
}

/// Input for the first proposal of a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InitialRequest {
    pub iteration_count: u32,
    pub target_description: Option<String>,
    pub reference_context: Option<String>,
    pub weights: ScoreWeights,
}

/// Input for every later proposal.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EditRequest {
    pub iteration: u32,
    pub iteration_count: u32,
    pub current_source: String,
    pub critique: String,
    pub pacing: Pacing,
    pub previous_scores: Option<ScoreVector>,
    pub weights: ScoreWeights,
    pub target_description: Option<String>,
    pub reference_context: Option<String>,
}

/// Input for the single repair attempt after a compile failure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RepairRequest {
    pub iteration: u32,
    pub source: String,
    pub diagnostic: String,
}

/// A validated proposer reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub source: String,
    #[serde(default)]
    pub notes: String,
}

impl Proposal {
    pub fn new(source: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            notes: notes.into(),
        }
    }
}

/// Why a proposal could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProposalError {
    #[error("proposer not configured: {0}")]
    NotConfigured(String),

    #[error("proposer request failed: {0}")]
    Transport(String),

    #[error("proposer returned malformed output: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Proposer: Send + Sync {
    async fn propose_initial(&self, request: &InitialRequest) -> Result<Proposal, ProposalError>;

    async fn propose_edit(&self, request: &EditRequest) -> Result<Proposal, ProposalError>;

    async fn repair(&self, request: &RepairRequest) -> Result<Proposal, ProposalError>;
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// One render attempt.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub source: &'a str,
    pub target: &'a RgbImage,
    pub frame_count: u32,
    /// Output size `(width, height)`.
    pub resolution: (u32, u32),
}

impl RenderRequest<'_> {
    /// Time parameter for each frame, in order.
    pub fn frame_times(&self) -> Vec<f32> {
        (0..self.frame_count.max(1))
            .map(|f| Frame::time_for(f, self.frame_count))
            .collect()
    }
}

/// Render failures. `Compile` carries the diagnostic handed to repair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("compile failed: {0}")]
    Compile(String),

    #[error("render context unavailable: {0}")]
    Context(String),

    #[error("renderer returned no frames")]
    NoFrames,

    #[error("render output unreadable: {0}")]
    Output(String),
}

impl RenderError {
    /// Text suitable for the repair prompt and the iteration record.
    pub fn diagnostic(&self) -> String {
        match self {
            RenderError::Compile(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Executes candidate source against the interface contract.
///
/// Implementations acquire their execution context per call and release it
/// on every exit path before returning.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<Frame>, RenderError>;
}

// ---------------------------------------------------------------------------
// Critic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriticError {
    #[error("critic disabled: {0}")]
    Disabled(String),

    #[error("critic request failed: {0}")]
    Transport(String),

    #[error("critic returned no text")]
    Empty,
}

#[async_trait]
pub trait Critic: Send + Sync {
    /// Describe what must change for `output` to look like `target`.
    async fn critique(&self, target: &RgbImage, output: &RgbImage) -> Result<String, CriticError>;

    /// Optional upfront gap analysis of the target before iteration 0.
    async fn discover(
        &self,
        _target: &RgbImage,
        _reference_context: Option<&str>,
    ) -> Result<String, CriticError> {
        Err(CriticError::Disabled("discovery not supported".to_string()))
    }
}

// ---------------------------------------------------------------------------
// External rank metric
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricError {
    #[error("metric backend unavailable: {0}")]
    Unavailable(String),

    #[error("metric evaluation failed: {0}")]
    Failed(String),
}

/// An externally computed perceptual metric with a declared direction.
#[async_trait]
pub trait PerceptualMetric: Send + Sync {
    fn name(&self) -> &str;

    fn direction(&self) -> RankDirection;

    async fn measure(&self, target: &RgbImage, frame: &Frame) -> Result<f64, MetricError>;
}
