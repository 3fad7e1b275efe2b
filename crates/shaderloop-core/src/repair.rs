//! Render-with-repair cascade.
//!
//! Bounded policy: one render, at most one repair attempt, then a
//! deterministic fallback to the last source known to render. The cascade
//! never fails; if even the fallback cannot be rendered, blank frames at the
//! requested resolution are returned so the caller always has frames.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborators::{Proposer, RenderError, RenderRequest, Renderer, RepairRequest};
use crate::contract::InterfaceContract;
use crate::domain::{Candidate, CandidateOrigin, Frame};
use crate::metrics::METRICS;
use crate::obs;

/// Repair attempts allowed per render before falling back.
pub const MAX_REPAIR_ATTEMPTS: u32 = 1;

/// Which step of the cascade produced the frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenderPath {
    FirstAttempt,
    Repaired,
    LastKnownGood,
    BlankFloor,
}

/// Output settings shared by every attempt of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub frame_count: u32,
    pub resolution: (u32, u32),
}

/// Result of running the cascade for one candidate.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub frames: Vec<Frame>,

    /// Candidate whose source actually produced `frames`.
    pub candidate: Candidate,

    pub path: RenderPath,

    /// Renderer diagnostics in the order they occurred.
    pub diagnostics: Vec<String>,

    /// Non-renderer notes (repair refusals, skipped steps).
    pub notes: Vec<String>,
}

impl CascadeOutcome {
    /// Diagnostics joined for the iteration record; empty on a clean render.
    pub fn compile_error(&self) -> String {
        self.diagnostics.join("\n\n")
    }

    /// Whether `candidate` is safe to use as the next last-known-good.
    pub fn rendered(&self) -> bool {
        self.path != RenderPath::BlankFloor
    }
}

/// Drives one candidate through render → repair → fallback.
pub struct RepairCascade<'a> {
    renderer: &'a dyn Renderer,
    repairer: &'a dyn Proposer,
    contract: &'a InterfaceContract,
}

impl<'a> RepairCascade<'a> {
    pub fn new(renderer: &'a dyn Renderer, repairer: &'a dyn Proposer) -> Self {
        Self {
            renderer,
            repairer,
            contract: InterfaceContract::standard(),
        }
    }

    /// Render `candidate`, repairing or falling back as needed.
    ///
    /// `last_known_good` must be either the baseline shader or a candidate
    /// that rendered earlier in the same run.
    pub async fn render_with_repair(
        &self,
        candidate: &Candidate,
        last_known_good: &Candidate,
        target: &RgbImage,
        settings: RenderSettings,
    ) -> CascadeOutcome {
        let iteration = candidate.iteration();
        let mut diagnostics = Vec::new();
        let mut notes = Vec::new();

        let first_error = match self.attempt(candidate, target, settings).await {
            Ok(frames) => {
                return CascadeOutcome {
                    frames,
                    candidate: candidate.clone(),
                    path: RenderPath::FirstAttempt,
                    diagnostics,
                    notes,
                }
            }
            Err(err) => err,
        };
        let diagnostic = first_error.diagnostic();
        debug!(iteration, error = %first_error, "first render failed");
        diagnostics.push(diagnostic.clone());

        if let Some(revised) = self
            .request_repair(candidate, &diagnostic, &mut notes)
            .await
        {
            METRICS.inc_repairs();
            match self.attempt(&revised, target, settings).await {
                Ok(frames) => {
                    obs::emit_render_repaired(iteration, revised.digest());
                    return CascadeOutcome {
                        frames,
                        candidate: revised,
                        path: RenderPath::Repaired,
                        diagnostics,
                        notes,
                    };
                }
                Err(err) => {
                    debug!(iteration, error = %err, "repaired render failed");
                    diagnostics.push(err.diagnostic());
                }
            }
        }

        METRICS.inc_fallback_renders();
        let fallback = last_known_good.reuse_for(
            iteration,
            candidate.path(),
            CandidateOrigin::LastKnownGood {
                parent: last_known_good.id(),
            },
        );

        if fallback.digest() != candidate.digest() {
            match self.attempt(&fallback, target, settings).await {
                Ok(frames) => {
                    obs::emit_render_fallback(iteration, &diagnostic);
                    return CascadeOutcome {
                        frames,
                        candidate: fallback,
                        path: RenderPath::LastKnownGood,
                        diagnostics,
                        notes,
                    };
                }
                Err(err) => diagnostics.push(err.diagnostic()),
            }
        } else {
            notes.push("last known good is the failing source; fallback render skipped".to_string());
        }

        warn!(
            iteration,
            event = "render.blank_floor",
            "no source rendered; emitting blank frames"
        );
        notes.push("renderer produced no frames for any source; blank frames substituted".to_string());
        CascadeOutcome {
            frames: blank_frames(settings),
            candidate: fallback,
            path: RenderPath::BlankFloor,
            diagnostics,
            notes,
        }
    }

    async fn attempt(
        &self,
        candidate: &Candidate,
        target: &RgbImage,
        settings: RenderSettings,
    ) -> Result<Vec<Frame>, RenderError> {
        let request = RenderRequest {
            source: candidate.source(),
            target,
            frame_count: settings.frame_count,
            resolution: settings.resolution,
        };
        let frames = self.renderer.render(&request).await?;
        if frames.is_empty() {
            return Err(RenderError::NoFrames);
        }
        Ok(frames)
    }

    /// Ask for one revision; `None` means go straight to the fallback.
    async fn request_repair(
        &self,
        candidate: &Candidate,
        diagnostic: &str,
        notes: &mut Vec<String>,
    ) -> Option<Candidate> {
        let request = RepairRequest {
            iteration: candidate.iteration(),
            source: candidate.source().to_string(),
            diagnostic: diagnostic.to_string(),
        };

        let proposal = match self.repairer.repair(&request).await {
            Ok(p) => p,
            Err(err) => {
                notes.push(format!("repair unavailable: {err}"));
                return None;
            }
        };

        if proposal.source.trim() == candidate.source().trim() {
            notes.push("repair returned unchanged source".to_string());
            return None;
        }
        if let Err(violation) = self.contract.check(&proposal.source) {
            notes.push(format!("repair rejected: {violation}"));
            return None;
        }
        if !proposal.notes.is_empty() {
            notes.push(format!("repair: {}", proposal.notes));
        }

        Some(candidate.derive(
            CandidateOrigin::Repaired {
                parent: candidate.id(),
            },
            proposal.source,
        ))
    }
}

fn blank_frames(settings: RenderSettings) -> Vec<Frame> {
    let (w, h) = settings.resolution;
    (0..settings.frame_count.max(1))
        .map(|f| Frame::blank(w, h, Frame::time_for(f, settings.frame_count)))
        .collect()
}
