//! Observability tests for the run lifecycle.
//!
//! Verifies that structured tracing events are emitted for run start,
//! each recorded iteration, fallbacks and run finish.

use std::sync::Arc;

use image::RgbImage;
use shaderloop_core::fakes::{FakeCritic, FakeRenderer, ScriptedProposer, BROKEN_MARKER};
use shaderloop_core::{
    emit_best_replaced, emit_proposal_fallback, emit_render_repaired, emit_run_finished,
    emit_run_started, Orchestrator, Proposal, ProposalError, RunConfig, RunContext, ScoreEngine,
    ScoreWeights, BASELINE_FRAGMENT_SHADER, METRICS,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_configuration() {
    emit_run_started("run-123", 5, 3, "composite");
    assert!(logs_contain("run.started"));
    assert!(logs_contain("run-123"));
}

#[traced_test]
#[test]
fn test_emit_run_finished_logs_summary() {
    emit_run_finished("run-456", 5000, 4, 2, false);
    assert!(logs_contain("run.finished"));
}

#[traced_test]
#[test]
fn test_emit_render_repaired_logs_digest() {
    emit_render_repaired(3, "abc123");
    assert!(logs_contain("render.repaired"));
    assert!(logs_contain("abc123"));
}

#[traced_test]
#[test]
fn test_emit_proposal_fallback_is_warning() {
    let err = ProposalError::NotConfigured("missing key".to_string());
    emit_proposal_fallback(0, &err);
    assert!(logs_contain("WARN"));
    assert!(logs_contain("missing key"));
}

#[traced_test]
#[test]
fn test_emit_best_replaced() {
    emit_best_replaced(1, "composite", Some(0.75));
    assert!(logs_contain("best.replaced"));
}

#[tokio::test]
#[traced_test]
async fn test_run_emits_lifecycle_events() {
    let proposer = ScriptedProposer::new()
        .with_initial(vec![Err(ProposalError::Transport("refused".to_string()))])
        .with_edits(vec![Ok(Proposal::new(
            format!("{BASELINE_FRAGMENT_SHADER}\n// {BROKEN_MARKER}"),
            "",
        ))]);
    let orch = Orchestrator::new(
        Arc::new(proposer),
        Arc::new(FakeRenderer::new()),
        Arc::new(FakeCritic::disabled()),
    )
    .with_engine(ScoreEngine::new(16).expect("engine"));

    let cfg = RunConfig::new(2, 1, ScoreWeights::default())
        .with_resolution(16, 16)
        .with_discovery(false);
    let before = METRICS.iterations();
    orch.run(&cfg, RunContext::new(RgbImage::new(16, 16)))
        .await
        .expect("run");

    assert!(logs_contain("run.started"));
    assert!(logs_contain("proposal.fallback"));
    assert!(logs_contain("render.fallback"));
    assert!(logs_contain("critic.stubbed"));
    assert!(logs_contain("iteration.recorded"));
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("fallback_renders"));
    assert!(METRICS.iterations() >= before + 2);
}
