//! Best-result tracking across a run.

use crate::domain::{BestRecord, Candidate, RankDirection};

/// Holds the single best result of a run under one declared metric.
///
/// Replacement rules:
/// - the first real value always becomes best
/// - afterwards only a strict improvement in `direction` replaces it
/// - an unavailable value never replaces a real one
///
/// Until a real value arrives the first candidate is held as a provisional
/// best with no value, so a run always has something to return.
#[derive(Debug, Clone)]
pub struct BestTracker {
    metric: String,
    direction: RankDirection,
    best: Option<BestRecord>,
}

impl BestTracker {
    pub fn new(metric: impl Into<String>, direction: RankDirection) -> Self {
        Self {
            metric: metric.into(),
            direction,
            best: None,
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn direction(&self) -> RankDirection {
        self.direction
    }

    /// Offer an iteration's result. Returns `true` when it became the best.
    pub fn consider(
        &mut self,
        rank_value: Option<f64>,
        iteration: u32,
        candidate: &Candidate,
        frame_reference: &str,
    ) -> bool {
        let rank_value = rank_value.filter(|v| !v.is_nan());

        let replace = match (&self.best, rank_value) {
            (None, _) => true,
            (Some(current), Some(new)) => match current.rank_value {
                None => true,
                Some(old) => self.direction.improves(new, old),
            },
            (Some(_), None) => false,
        };

        if replace {
            self.best = Some(BestRecord {
                iteration,
                rank_value,
                metric: self.metric.clone(),
                direction: self.direction,
                frame_reference: frame_reference.to_string(),
                candidate_id: candidate.id(),
                candidate_source: candidate.source().to_string(),
            });
        }
        replace
    }

    pub fn best(&self) -> Option<&BestRecord> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<BestRecord> {
        self.best
    }
}
