//! Iteration history and best-result snapshots.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::candidate::Candidate;
use crate::domain::frame::Frame;
use crate::domain::score::{RankDirection, ScoreVector};

/// Everything observed during one loop iteration.
///
/// Records are append-only and kept in iteration order. The representative
/// frame's pixels are held in memory but not serialized; `frame_references`
/// name the persisted artifacts instead.
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub iteration: u32,

    /// The candidate whose render produced the frames.
    pub candidate: Candidate,

    /// Index of the representative frame within `frame_references`.
    pub selected_frame: usize,

    /// Deterministic reference for every frame of the iteration.
    pub frame_references: Vec<String>,

    /// Rank metric value per frame; `None` where scoring was unavailable.
    pub per_frame_values: Vec<Option<f64>>,

    /// Perceptual scores of the representative frame.
    pub scores: Option<ScoreVector>,

    /// Value used for best tracking.
    pub rank_value: Option<f64>,

    /// Renderer diagnostics, empty when the first render succeeded.
    pub compile_error: String,

    /// Critic feedback, or the unavailability stub.
    pub critique: String,

    /// Proposer notes plus any fallback notes.
    pub notes: String,

    #[serde(skip)]
    pub representative: Frame,
}

impl IterationRecord {
    /// Reference of the representative frame.
    pub fn representative_reference(&self) -> &str {
        self.frame_references
            .get(self.selected_frame)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn had_compile_error(&self) -> bool {
        !self.compile_error.is_empty()
    }
}

/// Snapshot of the best iteration seen so far in a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BestRecord {
    pub iteration: u32,

    /// `None` only while no iteration has produced a real rank value.
    pub rank_value: Option<f64>,

    pub metric: String,
    pub direction: RankDirection,
    pub frame_reference: String,
    pub candidate_id: Uuid,
    pub candidate_source: String,
}

impl BestRecord {
    /// Whether the record is a placeholder without a rank value.
    pub fn is_provisional(&self) -> bool {
        self.rank_value.is_none()
    }
}

/// Final product of a run: full history plus the best result.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub records: Vec<IterationRecord>,
    pub best: BestRecord,

    /// True when the run stopped early on a cancellation request.
    pub cancelled: bool,
}

impl RunOutcome {
    /// Number of iterations actually attempted.
    pub fn iterations(&self) -> usize {
        self.records.len()
    }

    /// Record that produced the best result.
    pub fn best_record(&self) -> Option<&IterationRecord> {
        self.records
            .iter()
            .find(|r| r.iteration == self.best.iteration)
    }
}
