//! Domain models for shaderloop.
//!
//! Canonical definitions for the core entities:
//! - `Candidate`: immutable shader source with provenance
//! - `Frame`: one rendered raster plus its time parameter
//! - `ScoreVector` / `ScoreWeights`: perceptual similarities and their composite
//! - `IterationRecord` / `BestRecord`: run history and best-result snapshot

pub mod candidate;
pub mod error;
pub mod frame;
pub mod record;
pub mod score;

// Re-export main types and errors
pub use candidate::{source_digest, Candidate, CandidateOrigin, ProposalPath};
pub use error::{ConfigError, LoopError, Result};
pub use frame::Frame;
pub use record::{BestRecord, IterationRecord, RunOutcome};
pub use score::{RankDirection, ScoreVector, ScoreWeights};
