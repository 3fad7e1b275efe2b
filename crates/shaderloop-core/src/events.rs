//! Typed progress events for a streaming run.
//!
//! A run yields, in order: `input_image`, an optional `discovery`, one
//! `iteration` per loop iteration, `best`, then `done`. Events go to a
//! single consumer over a `tokio::sync::mpsc` channel.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{BestRecord, IterationRecord};

/// Per-iteration payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IterationEvent {
    pub iteration_index: u32,

    /// Perceptual scores plus composite, when the engine produced them.
    pub metrics: Option<BTreeMap<String, f64>>,
    pub rank_value: Option<f64>,
    pub per_frame_values: Vec<Option<f64>>,
    pub selected_frame: usize,
    pub frame_references: Vec<String>,
    pub candidate_source: String,
    pub compile_error: String,
    pub critique_text: String,
    pub notes: String,
}

impl From<&IterationRecord> for IterationEvent {
    fn from(record: &IterationRecord) -> Self {
        let metrics = record.scores.as_ref().map(|s| {
            let mut m = s.metrics.clone();
            m.insert(crate::domain::score::COMPOSITE.to_string(), s.composite);
            m
        });
        Self {
            iteration_index: record.iteration,
            metrics,
            rank_value: record.rank_value,
            per_frame_values: record.per_frame_values.clone(),
            selected_frame: record.selected_frame,
            frame_references: record.frame_references.clone(),
            candidate_source: record.candidate.source().to_string(),
            compile_error: record.compile_error.clone(),
            critique_text: record.critique.clone(),
            notes: record.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    InputImage {
        run_id: Uuid,
        reference: String,
        width: u32,
        height: u32,
    },
    Discovery {
        text: String,
    },
    Iteration(IterationEvent),
    Best(BestRecord),
    Done {
        run_id: Uuid,
        iterations: usize,
        cancelled: bool,
    },
}

impl RunEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::InputImage { .. } => "input_image",
            RunEvent::Discovery { .. } => "discovery",
            RunEvent::Iteration(_) => "iteration",
            RunEvent::Best(_) => "best",
            RunEvent::Done { .. } => "done",
        }
    }
}

/// An event stamped with its emission time.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimedEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RunEvent,
}

/// Sending half of the event stream. A sink without a channel discards
/// events; a closed receiver does not affect the run.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<TimedEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<TimedEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn discard() -> Self {
        Self::default()
    }

    pub async fn send(&self, event: RunEvent) {
        let Some(tx) = &self.tx else { return };
        let kind = event.kind();
        let timed = TimedEvent {
            at: Utc::now(),
            event,
        };
        if tx.send(timed).await.is_err() {
            debug!(kind, "event receiver dropped");
        }
    }
}
