//! Shaderloop Core Library
//!
//! Closed-loop shader optimization: propose fragment shader source, render
//! it, score the frames against a target image, critique, and feed the
//! result back into the next proposal.
//!
//! The proposer, renderer, critic and optional rank metric are injected as
//! trait objects; see [`collaborators`].

pub mod artifacts;
pub mod best;
pub mod collaborators;
pub mod config;
pub mod contract;
pub mod domain;
pub mod events;
pub mod fakes;
pub mod frame_select;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod repair;
pub mod scoring;
pub mod telemetry;

pub use domain::{
    source_digest, BestRecord, Candidate, CandidateOrigin, ConfigError, Frame, IterationRecord,
    LoopError, ProposalPath, RankDirection, Result, RunOutcome, ScoreVector, ScoreWeights,
};

pub use artifacts::{frame_file_name, ArtifactError, FrameStore};
pub use best::BestTracker;
pub use collaborators::{
    Critic, CriticError, EditRequest, InitialRequest, MetricError, Pacing, PerceptualMetric,
    Proposal, ProposalError, Proposer, RenderError, RenderRequest, Renderer, RepairRequest,
    CRITIQUE_UNAVAILABLE,
};
pub use config::{RunConfig, MAX_FRAME_COUNT};
pub use contract::{
    ContractViolation, InterfaceContract, BASELINE_FRAGMENT_SHADER, INTERFACE_CONTRACT,
};
pub use events::{EventSink, IterationEvent, RunEvent, TimedEvent};
pub use frame_select::{select_frame, FrameSelection};
pub use orchestrator::{CancelFlag, Orchestrator, RankPolicy, RunContext};
pub use repair::{CascadeOutcome, RenderPath, RenderSettings, RepairCascade};
pub use scoring::{FeatureMaps, ScoreEngine, ScoreError};

pub use metrics::METRICS;
pub use obs::{
    emit_best_replaced, emit_critic_stubbed, emit_iteration_recorded, emit_proposal_fallback,
    emit_render_fallback, emit_render_repaired, emit_run_finished, emit_run_started, run_span,
};
pub use telemetry::init_tracing;

/// Shaderloop version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
