//! End-to-end runs of the optimization loop against in-memory collaborators.

use std::sync::Arc;

use image::RgbImage;
use shaderloop_core::fakes::{stripe_pattern, FakeCritic, FakeRenderer, ScriptedProposer};
use shaderloop_core::{
    CandidateOrigin, FrameStore, Orchestrator, Proposal, ProposalError, ProposalPath, RunConfig,
    RunContext, ScoreEngine, ScoreWeights, BASELINE_FRAGMENT_SHADER, CRITIQUE_UNAVAILABLE,
};
use tempfile::tempdir;
use tokio::sync::mpsc;

fn target() -> RgbImage {
    stripe_pattern("target image", 32, 32, 0.0)
}

fn config(iterations: u32, frames: u32, weights: ScoreWeights) -> RunConfig {
    RunConfig::new(iterations, frames, weights)
        .with_resolution(32, 32)
        .with_discovery(false)
}

fn good(tag: &str) -> Result<Proposal, ProposalError> {
    Ok(Proposal::new(
        format!("{BASELINE_FRAGMENT_SHADER}\n// variant {tag}"),
        format!("variant {tag}"),
    ))
}

fn engine() -> ScoreEngine {
    ScoreEngine::new(32).expect("engine")
}

#[tokio::test]
async fn test_contract_violations_fall_back_to_baseline_every_iteration() {
    let invalid = Proposal::new("void main() { gl_FragColor = vec4(1.0); }", "");
    let orch = Orchestrator::new(
        Arc::new(ScriptedProposer::always(Ok(invalid))),
        Arc::new(FakeRenderer::new()),
        Arc::new(FakeCritic::fixed("closer")),
    )
    .with_engine(engine());

    let out = orch
        .run(&config(3, 1, ScoreWeights::default()), RunContext::new(target()))
        .await
        .expect("run");

    assert_eq!(out.records.len(), 3);
    for rec in &out.records {
        assert_eq!(rec.candidate.source(), BASELINE_FRAGMENT_SHADER);
        assert!(rec.candidate.is_substitute());
        assert!(rec.compile_error.is_empty());
        assert!(rec.notes.contains("interface contract"));
    }
    assert_eq!(out.records[0].candidate.origin(), CandidateOrigin::Baseline);
    assert!(matches!(
        out.records[2].candidate.origin(),
        CandidateOrigin::CarriedForward { .. }
    ));
}

#[tokio::test]
async fn test_disabled_critic_uses_stub_and_edits_continue() {
    let proposer = Arc::new(
        ScriptedProposer::new()
            .with_initial(vec![good("a")])
            .with_edits(vec![good("b"), good("c")]),
    );
    let orch = Orchestrator::new(
        proposer.clone(),
        Arc::new(FakeRenderer::new()),
        Arc::new(FakeCritic::disabled()),
    )
    .with_engine(engine());

    let out = orch
        .run(&config(3, 1, ScoreWeights::default()), RunContext::new(target()))
        .await
        .expect("run");

    assert_eq!(out.records.len(), 3);
    assert!(out.records.iter().all(|r| r.critique == CRITIQUE_UNAVAILABLE));

    for (rec, tag) in out.records[1..].iter().zip(["b", "c"]) {
        assert_eq!(rec.candidate.path(), ProposalPath::Edit);
        assert_eq!(rec.candidate.origin(), CandidateOrigin::Proposed);
        assert!(rec.candidate.source().ends_with(&format!("variant {tag}")));
    }
    assert!(proposer
        .edit_requests()
        .iter()
        .all(|r| r.critique == CRITIQUE_UNAVAILABLE));
}

#[tokio::test]
async fn test_all_zero_weights_use_equal_mean() {
    let orch = Orchestrator::new(
        Arc::new(ScriptedProposer::always(good("z"))),
        Arc::new(FakeRenderer::new()),
        Arc::new(FakeCritic::fixed("ok")),
    )
    .with_engine(engine());

    let out = orch
        .run(&config(2, 2, ScoreWeights::zero()), RunContext::new(target()))
        .await
        .expect("run");

    for rec in &out.records {
        let scores = rec.scores.as_ref().expect("scores");
        let mean = (scores.frequency() + scores.edge() + scores.texture()) / 3.0;
        assert!(scores.composite.is_finite());
        assert!((scores.composite - mean).abs() < 1e-12);
        assert_eq!(rec.rank_value, Some(scores.composite));
    }
}

#[tokio::test]
async fn test_broken_candidates_keep_record_count() {
    let broken = Proposal::new(
        format!(
            "{BASELINE_FRAGMENT_SHADER}\n// {}",
            shaderloop_core::fakes::BROKEN_MARKER
        ),
        "",
    );
    let proposer = ScriptedProposer::new()
        .with_initial(vec![good("first")])
        .with_edits(vec![Ok(broken.clone()), Ok(broken)]);
    let orch = Orchestrator::new(
        Arc::new(proposer),
        Arc::new(FakeRenderer::new()),
        Arc::new(FakeCritic::fixed("ok")),
    )
    .with_engine(engine());

    let out = orch
        .run(&config(3, 1, ScoreWeights::default()), RunContext::new(target()))
        .await
        .expect("run");

    assert_eq!(out.records.len(), 3);
    let first_source = out.records[0].candidate.source().to_string();
    for rec in &out.records[1..] {
        assert!(rec.had_compile_error());
        assert!(matches!(
            rec.candidate.origin(),
            CandidateOrigin::LastKnownGood { .. }
        ));
        assert_eq!(rec.candidate.source(), first_source);
    }
}

#[tokio::test]
async fn test_event_stream_order() {
    let orch = Orchestrator::new(
        Arc::new(ScriptedProposer::always(good("e"))),
        Arc::new(FakeRenderer::new()),
        Arc::new(FakeCritic::fixed("ok").with_discovery("high-contrast stripes")),
    )
    .with_engine(engine());

    let (tx, mut rx) = mpsc::channel(64);
    let cfg = config(3, 1, ScoreWeights::default()).with_discovery(true);
    let out = orch
        .run_streaming(&cfg, RunContext::new(target()), tx)
        .await
        .expect("run");

    let mut kinds = Vec::new();
    while let Some(ev) = rx.recv().await {
        kinds.push(ev.event.kind());
    }
    assert_eq!(
        kinds,
        vec!["input_image", "discovery", "iteration", "iteration", "iteration", "best", "done"]
    );
    assert_eq!(out.records.len(), 3);
}

#[tokio::test]
async fn test_artifacts_written_under_store() {
    let dir = tempdir().expect("tempdir");
    let store = FrameStore::open(dir.path()).expect("store");
    let orch = Orchestrator::new(
        Arc::new(ScriptedProposer::always(good("p"))),
        Arc::new(FakeRenderer::new()),
        Arc::new(FakeCritic::fixed("ok")),
    )
    .with_engine(engine())
    .with_frame_store(store);

    let out = orch
        .run(&config(2, 2, ScoreWeights::default()), RunContext::new(target()))
        .await
        .expect("run");

    for name in [
        "input.png",
        "iter_01_f01.png",
        "iter_01_f02.png",
        "iter_02_f01.png",
        "iter_02_f02.png",
        "run.json",
    ] {
        assert!(dir.path().join(name).exists(), "missing {name}");
    }
    assert!(dir.path().join(&out.best.frame_reference).exists());

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("run.json")).expect("read"))
            .expect("json");
    assert_eq!(summary["records"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let orch = Arc::new(
        Orchestrator::new(
            Arc::new(ScriptedProposer::always(good("c"))),
            Arc::new(FakeRenderer::new()),
            Arc::new(FakeCritic::fixed("ok")),
        )
        .with_engine(engine()),
    );
    let target = Arc::new(target());

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let orch = Arc::clone(&orch);
            let target = Arc::clone(&target);
            tokio::spawn(async move {
                orch.run(&config(2, 1, ScoreWeights::default()), RunContext::new(target))
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for h in handles {
        let out = h.await.expect("join").expect("run");
        assert_eq!(out.records.len(), 2);
        ids.push(out.run_id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}
