//! The closed optimization loop.
//!
//! Each iteration runs `PROPOSE -> RENDER (-> REPAIR) -> SELECT -> SCORE ->
//! CRITIQUE -> RECORD`. Collaborator failures are converted to fallback
//! values at this boundary, so once the configuration validates a run always
//! finishes with one record per attempted iteration and a best result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tokio::sync::mpsc;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::artifacts::{self, FrameStore, INPUT_FILE_NAME};
use crate::best::BestTracker;
use crate::collaborators::{
    Critic, EditRequest, InitialRequest, Pacing, PerceptualMetric, Proposal, ProposalError,
    Proposer, Renderer, CRITIQUE_UNAVAILABLE,
};
use crate::config::RunConfig;
use crate::contract::{InterfaceContract, BASELINE_FRAGMENT_SHADER};
use crate::domain::score::COMPOSITE;
use crate::domain::{
    Candidate, CandidateOrigin, Frame, IterationRecord, LoopError, ProposalPath, RankDirection,
    Result, RunOutcome, ScoreVector,
};
use crate::events::{EventSink, IterationEvent, RunEvent, TimedEvent};
use crate::frame_select::select_frame;
use crate::metrics::METRICS;
use crate::obs;
use crate::repair::{RenderSettings, RepairCascade};
use crate::scoring::{FeatureMaps, ScoreEngine};

/// Source of the value used for frame selection and best tracking.
///
/// Fixed for the lifetime of a run.
#[derive(Clone, Default)]
pub enum RankPolicy {
    /// ScoreEngine composite, higher is better.
    #[default]
    Composite,

    /// An external perceptual metric with its own direction.
    External(Arc<dyn PerceptualMetric>),
}

impl RankPolicy {
    pub fn metric_name(&self) -> String {
        match self {
            RankPolicy::Composite => COMPOSITE.to_string(),
            RankPolicy::External(metric) => metric.name().to_string(),
        }
    }

    pub fn direction(&self) -> RankDirection {
        match self {
            RankPolicy::Composite => RankDirection::HigherIsBetter,
            RankPolicy::External(metric) => metric.direction(),
        }
    }
}

impl std::fmt::Debug for RankPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankPolicy::Composite => f.write_str("Composite"),
            RankPolicy::External(m) => f.debug_tuple("External").field(&m.name()).finish(),
        }
    }
}

/// Cooperative cancellation, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run inputs. The target is shared read-only.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub target: Arc<RgbImage>,
    pub target_description: Option<String>,
    pub reference_context: Option<String>,
    pub cancel: CancelFlag,
}

impl RunContext {
    pub fn new(target: impl Into<Arc<RgbImage>>) -> Self {
        Self {
            target: target.into(),
            target_description: None,
            reference_context: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.target_description = Some(description.into());
        self
    }

    pub fn with_reference_context(mut self, context: impl Into<String>) -> Self {
        self.reference_context = Some(context.into());
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Inputs carried from one iteration to the next edit proposal.
struct Previous {
    candidate: Candidate,
    critique: String,
    scores: Option<ScoreVector>,
}

/// Per-frame rank values plus the engine scores of each frame.
struct FrameScores {
    values: Vec<Option<f64>>,
    vectors: Vec<Option<ScoreVector>>,
}

/// Drives the loop against injected collaborators.
pub struct Orchestrator {
    proposer: Arc<dyn Proposer>,
    renderer: Arc<dyn Renderer>,
    critic: Arc<dyn Critic>,
    engine: ScoreEngine,
    rank: RankPolicy,
    store: Option<FrameStore>,
    contract: &'static InterfaceContract,
}

impl Orchestrator {
    pub fn new(
        proposer: Arc<dyn Proposer>,
        renderer: Arc<dyn Renderer>,
        critic: Arc<dyn Critic>,
    ) -> Self {
        Self {
            proposer,
            renderer,
            critic,
            engine: ScoreEngine::default(),
            rank: RankPolicy::Composite,
            store: None,
            contract: InterfaceContract::standard(),
        }
    }

    pub fn with_engine(mut self, engine: ScoreEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_rank_policy(mut self, rank: RankPolicy) -> Self {
        self.rank = rank;
        self
    }

    /// Persist the input image, every frame and `run.json` under `store`.
    pub fn with_frame_store(mut self, store: FrameStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn rank_policy(&self) -> &RankPolicy {
        &self.rank
    }

    /// Run the loop to completion without streaming events.
    pub async fn run(&self, config: &RunConfig, ctx: RunContext) -> Result<RunOutcome> {
        self.run_with_sink(config, ctx, EventSink::discard()).await
    }

    /// Run the loop, sending progress events to `tx`.
    pub async fn run_streaming(
        &self,
        config: &RunConfig,
        ctx: RunContext,
        tx: mpsc::Sender<TimedEvent>,
    ) -> Result<RunOutcome> {
        self.run_with_sink(config, ctx, EventSink::new(tx)).await
    }

    async fn run_with_sink(
        &self,
        config: &RunConfig,
        ctx: RunContext,
        sink: EventSink,
    ) -> Result<RunOutcome> {
        config.validate()?;
        let (width, height) = ctx.target.dimensions();
        if width == 0 || height == 0 {
            return Err(LoopError::TargetUnavailable(format!(
                "target image is empty ({width}x{height})"
            )));
        }
        let target_maps = self
            .engine
            .prepare(&ctx.target)
            .map_err(|e| LoopError::TargetUnavailable(e.to_string()))?;

        let run_id = Uuid::new_v4();
        self.drive(config, ctx, sink, run_id, target_maps)
            .instrument(obs::run_span(&run_id.to_string()))
            .await
    }

    async fn drive(
        &self,
        config: &RunConfig,
        mut ctx: RunContext,
        sink: EventSink,
        run_id: Uuid,
        target_maps: FeatureMaps,
    ) -> Result<RunOutcome> {
        let (width, height) = ctx.target.dimensions();
        let run_id_str = run_id.to_string();
        let started = Instant::now();
        obs::emit_run_started(
            &run_id_str,
            config.iteration_count,
            config.frame_count,
            &self.rank.metric_name(),
        );

        if let Some(store) = &self.store {
            if let Err(err) = store.save_input(&ctx.target) {
                warn!(error = %err, "failed to persist input image");
            }
        }
        sink.send(RunEvent::InputImage {
            run_id,
            reference: INPUT_FILE_NAME.to_string(),
            width,
            height,
        })
        .await;

        if config.discovery {
            self.discover(&mut ctx, &sink).await;
        }

        let settings = RenderSettings {
            frame_count: config.frame_count,
            resolution: config.resolution,
        };
        let cascade = RepairCascade::new(self.renderer.as_ref(), self.proposer.as_ref());
        let mut tracker = BestTracker::new(self.rank.metric_name(), self.rank.direction());
        let mut last_known_good = Candidate::new(
            0,
            ProposalPath::Initial,
            CandidateOrigin::Baseline,
            BASELINE_FRAGMENT_SHADER,
        );
        let mut previous: Option<Previous> = None;
        let mut records: Vec<IterationRecord> = Vec::with_capacity(config.iteration_count as usize);
        let mut cancelled = false;

        for iteration in 0..config.iteration_count {
            if iteration > 0 && ctx.cancel.is_cancelled() {
                debug!(iteration, "cancellation requested");
                cancelled = true;
                break;
            }

            // PROPOSE
            let (candidate, mut notes) = self
                .propose(iteration, config, &ctx, previous.as_ref())
                .await;

            // RENDER / REPAIR
            let outcome = cascade
                .render_with_repair(&candidate, &last_known_good, &ctx.target, settings)
                .await;
            if outcome.rendered() {
                last_known_good = outcome.candidate.clone();
            }
            notes.extend(outcome.notes.iter().cloned());

            let frame_references =
                artifacts::frame_references(iteration, outcome.frames.len(), config.frame_count);
            if let Some(store) = &self.store {
                if let Err(err) = store.save_frames(&frame_references, &outcome.frames) {
                    warn!(iteration, error = %err, "failed to persist frames");
                }
            }

            // SELECT / SCORE
            let frame_scores = self
                .score_frames(&ctx.target, &target_maps, &outcome.frames, config)
                .await;
            let selection = select_frame(frame_scores.values, self.rank.direction());
            let index = selection.index;
            let representative = outcome.frames[index].clone();
            let rank_value = selection.value();
            let scores = frame_scores.vectors.into_iter().nth(index).flatten();

            // CRITIQUE
            let critique = self
                .critique(iteration, &ctx.target, representative.image())
                .await;

            // RECORD
            let record = IterationRecord {
                iteration,
                candidate: outcome.candidate.clone(),
                selected_frame: index,
                frame_references,
                per_frame_values: selection.values,
                scores: scores.clone(),
                rank_value,
                compile_error: outcome.compile_error(),
                critique: critique.clone(),
                notes: notes.join("\n"),
                representative,
            };

            if tracker.consider(
                rank_value,
                iteration,
                &record.candidate,
                record.representative_reference(),
            ) {
                obs::emit_best_replaced(iteration, tracker.metric(), rank_value);
            }

            METRICS.inc_iterations();
            obs::emit_iteration_recorded(
                iteration,
                rank_value,
                index,
                record.had_compile_error(),
            );
            sink.send(RunEvent::Iteration(IterationEvent::from(&record)))
                .await;

            previous = Some(Previous {
                candidate: outcome.candidate,
                critique,
                scores,
            });
            records.push(record);
        }

        let best = tracker.into_best().ok_or(LoopError::EmptyRun)?;
        sink.send(RunEvent::Best(best.clone())).await;
        sink.send(RunEvent::Done {
            run_id,
            iterations: records.len(),
            cancelled,
        })
        .await;

        METRICS.flush();
        obs::emit_run_finished(
            &run_id_str,
            started.elapsed().as_millis() as u64,
            records.len(),
            best.iteration,
            cancelled,
        );

        let outcome = RunOutcome {
            run_id,
            records,
            best,
            cancelled,
        };
        if let Some(store) = &self.store {
            if let Err(err) = store.write_summary(&outcome) {
                warn!(error = %err, "failed to persist run summary");
            }
        }
        Ok(outcome)
    }

    async fn discover(&self, ctx: &mut RunContext, sink: &EventSink) {
        match self
            .critic
            .discover(&ctx.target, ctx.reference_context.as_deref())
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                sink.send(RunEvent::Discovery { text: text.clone() }).await;
                if ctx.target_description.is_none() {
                    ctx.target_description = Some(text);
                }
            }
            Ok(_) => debug!("discovery returned no text"),
            Err(err) => debug!(error = %err, "discovery skipped"),
        }
    }

    /// Obtain the iteration's candidate, substituting on any proposer failure.
    async fn propose(
        &self,
        iteration: u32,
        config: &RunConfig,
        ctx: &RunContext,
        previous: Option<&Previous>,
    ) -> (Candidate, Vec<String>) {
        let mut notes = Vec::new();

        let Some(prev) = previous else {
            let request = InitialRequest {
                iteration_count: config.iteration_count,
                target_description: ctx.target_description.clone(),
                reference_context: ctx.reference_context.clone(),
                weights: config.weights,
            };
            let reply = self.proposer.propose_initial(&request).await;
            return match self.accept(reply) {
                Ok(proposal) => {
                    push_note(&mut notes, proposal.notes);
                    (
                        Candidate::proposed(iteration, ProposalPath::Initial, proposal.source),
                        notes,
                    )
                }
                Err(err) => {
                    METRICS.inc_proposal_fallbacks();
                    obs::emit_proposal_fallback(iteration, &err);
                    notes.push(format!("initial proposal failed ({err}); using baseline shader"));
                    (
                        Candidate::new(
                            iteration,
                            ProposalPath::Initial,
                            CandidateOrigin::Baseline,
                            BASELINE_FRAGMENT_SHADER,
                        ),
                        notes,
                    )
                }
            };
        };

        let request = EditRequest {
            iteration,
            iteration_count: config.iteration_count,
            current_source: prev.candidate.source().to_string(),
            critique: prev.critique.clone(),
            pacing: Pacing::for_iteration(iteration, config.iteration_count),
            previous_scores: prev.scores.clone(),
            weights: config.weights,
            target_description: ctx.target_description.clone(),
            reference_context: ctx.reference_context.clone(),
        };
        let reply = self.proposer.propose_edit(&request).await;
        match self.accept(reply) {
            Ok(proposal) => {
                push_note(&mut notes, proposal.notes);
                (
                    Candidate::proposed(iteration, ProposalPath::Edit, proposal.source),
                    notes,
                )
            }
            Err(err) => {
                METRICS.inc_proposal_fallbacks();
                obs::emit_proposal_fallback(iteration, &err);
                notes.push(format!(
                    "edit proposal failed ({err}); carrying forward previous shader"
                ));
                (
                    prev.candidate.reuse_for(
                        iteration,
                        ProposalPath::Edit,
                        CandidateOrigin::CarriedForward {
                            parent: prev.candidate.id(),
                        },
                    ),
                    notes,
                )
            }
        }
    }

    /// Boundary validation of a proposer reply.
    fn accept(
        &self,
        reply: std::result::Result<Proposal, ProposalError>,
    ) -> std::result::Result<Proposal, ProposalError> {
        let proposal = reply?;
        self.contract
            .check(&proposal.source)
            .map_err(|v| ProposalError::Malformed(v.to_string()))?;
        Ok(proposal)
    }

    /// Rank value and engine scores for every frame; `None` where unavailable.
    async fn score_frames(
        &self,
        target: &RgbImage,
        target_maps: &FeatureMaps,
        frames: &[Frame],
        config: &RunConfig,
    ) -> FrameScores {
        let vectors: Vec<Option<ScoreVector>> = frames
            .iter()
            .map(|frame| {
                self.engine
                    .score_prepared(target_maps, frame.image(), &config.weights)
                    .map_err(|err| debug!(error = %err, "scoring unavailable"))
                    .ok()
            })
            .collect();

        let values = match &self.rank {
            RankPolicy::Composite => vectors
                .iter()
                .map(|v| v.as_ref().map(|s| s.composite))
                .collect(),
            RankPolicy::External(metric) => {
                let mut values = Vec::with_capacity(frames.len());
                for frame in frames {
                    match metric.measure(target, frame).await {
                        Ok(v) => values.push(Some(v)),
                        Err(err) => {
                            debug!(metric = metric.name(), error = %err, "rank metric unavailable");
                            values.push(None);
                        }
                    }
                }
                values
            }
        };

        FrameScores { values, vectors }
    }

    async fn critique(&self, iteration: u32, target: &RgbImage, output: &RgbImage) -> String {
        match self.critic.critique(target, output).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                METRICS.inc_critic_stubs();
                obs::emit_critic_stubbed(iteration, &"empty critique");
                CRITIQUE_UNAVAILABLE.to_string()
            }
            Err(err) => {
                METRICS.inc_critic_stubs();
                obs::emit_critic_stubbed(iteration, &err);
                CRITIQUE_UNAVAILABLE.to_string()
            }
        }
    }
}

fn push_note(notes: &mut Vec<String>, note: String) {
    if !note.trim().is_empty() {
        notes.push(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScoreWeights;
    use crate::fakes::{FakeCritic, FakeRenderer, ScriptedMetric, ScriptedProposer};

    fn target() -> RgbImage {
        crate::fakes::stripe_pattern("target", 16, 16, 0.0)
    }

    fn config(iterations: u32, frames: u32) -> RunConfig {
        RunConfig::new(iterations, frames, ScoreWeights::default())
            .with_resolution(16, 16)
            .with_discovery(false)
    }

    fn good(tag: &str) -> std::result::Result<Proposal, ProposalError> {
        Ok(Proposal::new(
            format!("{BASELINE_FRAGMENT_SHADER}\n// {tag}"),
            tag,
        ))
    }

    fn orchestrator(proposer: ScriptedProposer) -> Orchestrator {
        Orchestrator::new(
            Arc::new(proposer),
            Arc::new(FakeRenderer::new()),
            Arc::new(FakeCritic::fixed("more blue")),
        )
        .with_engine(ScoreEngine::new(16).expect("engine"))
    }

    #[tokio::test]
    async fn test_initial_then_edit_paths() {
        let proposer = Arc::new(
            ScriptedProposer::new()
                .with_initial(vec![good("first")])
                .with_edits(vec![good("second"), good("third")]),
        );
        let orch = Orchestrator::new(
            proposer.clone(),
            Arc::new(FakeRenderer::new()),
            Arc::new(FakeCritic::fixed("more blue")),
        )
        .with_engine(ScoreEngine::new(16).expect("engine"));

        let out = orch
            .run(&config(3, 1), RunContext::new(target()))
            .await
            .expect("run");

        assert_eq!(out.records.len(), 3);
        assert_eq!(out.records[0].candidate.path(), ProposalPath::Initial);
        assert_eq!(out.records[1].candidate.path(), ProposalPath::Edit);
        assert!(out.records.iter().all(|r| !r.candidate.is_substitute()));

        let edits = proposer.edit_requests();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].critique, "more blue");
        assert_eq!(edits[0].pacing, Pacing::Explore);
        assert_eq!(edits[1].pacing, Pacing::Refine);
        assert!(edits[0].current_source.ends_with("// first"));
        assert!(edits[0].previous_scores.is_some());
    }

    #[tokio::test]
    async fn test_failed_edit_carries_forward() {
        let orch = orchestrator(
            ScriptedProposer::new()
                .with_initial(vec![good("first")])
                .with_edits(vec![Err(ProposalError::Transport("timeout".into()))]),
        );
        let out = orch
            .run(&config(2, 1), RunContext::new(target()))
            .await
            .expect("run");

        let second = &out.records[1];
        assert!(matches!(
            second.candidate.origin(),
            CandidateOrigin::CarriedForward { .. }
        ));
        assert_eq!(second.candidate.source(), out.records[0].candidate.source());
        assert!(second.notes.contains("timeout"));
    }

    #[tokio::test]
    async fn test_multi_frame_selection_and_references() {
        let orch = orchestrator(ScriptedProposer::always(good("x")));
        let out = orch
            .run(&config(1, 3), RunContext::new(target()))
            .await
            .expect("run");

        let rec = &out.records[0];
        assert_eq!(rec.frame_references.len(), 3);
        assert_eq!(rec.per_frame_values.len(), 3);
        assert_eq!(rec.frame_references[0], "iter_01_f01.png");
        let best_value = rec
            .per_frame_values
            .iter()
            .flatten()
            .cloned()
            .fold(f64::MIN, f64::max);
        assert_eq!(rec.rank_value, Some(best_value));
        assert_eq!(out.best.frame_reference, rec.representative_reference());
    }

    #[tokio::test]
    async fn test_external_rank_lower_is_better() {
        let metric = ScriptedMetric::new(
            "lpips",
            RankDirection::LowerIsBetter,
            vec![Some(0.5), None, Some(0.2), Some(0.4)],
        );
        let orch = orchestrator(ScriptedProposer::always(good("x")))
            .with_rank_policy(RankPolicy::External(Arc::new(metric)));

        let out = orch
            .run(&config(4, 1), RunContext::new(target()))
            .await
            .expect("run");

        assert_eq!(out.best.metric, "lpips");
        assert_eq!(out.best.iteration, 2);
        assert_eq!(out.best.rank_value, Some(0.2));
        assert_eq!(out.records[1].rank_value, None);
        // engine scores are still recorded under an external rank
        assert!(out.records[1].scores.is_some());
    }

    #[tokio::test]
    async fn test_cancel_stops_between_iterations() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let orch = orchestrator(ScriptedProposer::always(good("x")));
        let out = orch
            .run(
                &config(5, 1),
                RunContext::new(target()).with_cancel_flag(cancel),
            )
            .await
            .expect("run");

        assert!(out.cancelled);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.best.iteration, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let orch = orchestrator(ScriptedProposer::new());
        let err = orch
            .run(&config(0, 1), RunContext::new(target()))
            .await
            .expect_err("must fail");
        assert!(matches!(err, LoopError::Config(_)));

        let err = orch
            .run(&config(1, 1), RunContext::new(RgbImage::new(0, 0)))
            .await
            .expect_err("must fail");
        assert!(matches!(err, LoopError::TargetUnavailable(_)));
    }

    #[tokio::test]
    async fn test_discovery_becomes_description() {
        let proposer = Arc::new(ScriptedProposer::always(good("x")));
        let orch = Orchestrator::new(
            proposer.clone(),
            Arc::new(FakeRenderer::new()),
            Arc::new(FakeCritic::fixed("ok").with_discovery("a red disc on black")),
        )
        .with_engine(ScoreEngine::new(16).expect("engine"));

        orch.run(&config(1, 1).with_discovery(true), RunContext::new(target()))
            .await
            .expect("run");

        let initial = proposer.initial_requests();
        assert_eq!(
            initial[0].target_description.as_deref(),
            Some("a red disc on black")
        );
    }
}
