//! Structured observability hooks for the optimization loop.
//!
//! This module provides:
//! - A run-scoped tracing span via [`run_span`], attached to the run future
//!   with `Instrument` so it stays `Send`
//! - Emission functions for lifecycle events: run start/finish, iteration
//!   recorded, repair and fallback renders, critic stubs, best replacement
//!
//! Events are emitted at `info!` level, fallbacks at `warn!`.
//! Filtering follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

/// Span tagged with the run_id; every event of a run is recorded inside it.
///
/// # Example
///
/// ```ignore
/// orchestrator.drive(...).instrument(run_span("0b6f...")).await
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("shaderloop.run", run_id = %run_id)
}

/// Emit event: run started with its configuration.
pub fn emit_run_started(run_id: &str, iteration_count: u32, frame_count: u32, rank_metric: &str) {
    info!(
        event = "run.started",
        run_id = %run_id,
        iteration_count = iteration_count,
        frame_count = frame_count,
        rank_metric = %rank_metric,
    );
}

/// Emit event: iteration record appended.
pub fn emit_iteration_recorded(
    iteration: u32,
    rank_value: Option<f64>,
    selected_frame: usize,
    had_compile_error: bool,
) {
    info!(
        event = "iteration.recorded",
        iteration = iteration,
        rank_value = ?rank_value,
        selected_frame = selected_frame,
        compile_error = had_compile_error,
    );
}

/// Emit event: proposer failed and a substitute candidate was used.
pub fn emit_proposal_fallback(iteration: u32, reason: &dyn std::fmt::Display) {
    warn!(event = "proposal.fallback", iteration = iteration, reason = %reason);
}

/// Emit event: a repaired revision rendered.
pub fn emit_render_repaired(iteration: u32, digest: &str) {
    info!(event = "render.repaired", iteration = iteration, digest = %digest);
}

/// Emit event: last-known-good source rendered in place of the candidate.
pub fn emit_render_fallback(iteration: u32, diagnostic: &str) {
    warn!(event = "render.fallback", iteration = iteration, diagnostic = %diagnostic);
}

/// Emit event: critic unavailable, stub critique substituted.
pub fn emit_critic_stubbed(iteration: u32, error: &dyn std::fmt::Display) {
    warn!(event = "critic.stubbed", iteration = iteration, error = %error);
}

/// Emit event: best result replaced.
pub fn emit_best_replaced(iteration: u32, metric: &str, rank_value: Option<f64>) {
    info!(
        event = "best.replaced",
        iteration = iteration,
        metric = %metric,
        rank_value = ?rank_value,
    );
}

/// Emit event: run finished.
pub fn emit_run_finished(
    run_id: &str,
    duration_ms: u64,
    iterations: usize,
    best_iteration: u32,
    cancelled: bool,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        iterations = iterations,
        best_iteration = best_iteration,
        cancelled = cancelled,
    );
}
