//! Global atomic counters for loop observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (the orchestrator does so at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    iterations: AtomicU64,
    repairs_attempted: AtomicU64,
    fallback_renders: AtomicU64,
    proposal_fallbacks: AtomicU64,
    critic_stubs: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            iterations: AtomicU64::new(0),
            repairs_attempted: AtomicU64::new(0),
            fallback_renders: AtomicU64::new(0),
            proposal_fallbacks: AtomicU64::new(0),
            critic_stubs: AtomicU64::new(0),
        }
    }

    pub fn inc_iterations(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "iterations", "counter incremented");
    }

    /// Count a repaired revision that reached the renderer.
    pub fn inc_repairs(&self) {
        self.repairs_attempted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repairs_attempted", "counter incremented");
    }

    pub fn inc_fallback_renders(&self) {
        self.fallback_renders.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "fallback_renders", "counter incremented");
    }

    pub fn inc_proposal_fallbacks(&self) {
        self.proposal_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "proposal_fallbacks", "counter incremented");
    }

    pub fn inc_critic_stubs(&self) {
        self.critic_stubs.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "critic_stubs", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            iterations = self.iterations(),
            repairs_attempted = self.repairs_attempted(),
            fallback_renders = self.fallback_renders(),
            proposal_fallbacks = self.proposal_fallbacks(),
            critic_stubs = self.critic_stubs(),
        );
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub fn repairs_attempted(&self) -> u64 {
        self.repairs_attempted.load(Ordering::Relaxed)
    }

    pub fn fallback_renders(&self) -> u64 {
        self.fallback_renders.load(Ordering::Relaxed)
    }

    pub fn proposal_fallbacks(&self) -> u64 {
        self.proposal_fallbacks.load(Ordering::Relaxed)
    }

    pub fn critic_stubs(&self) -> u64 {
        self.critic_stubs.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.iterations.store(0, Ordering::Relaxed);
        self.repairs_attempted.store(0, Ordering::Relaxed);
        self.fallback_renders.store(0, Ordering::Relaxed);
        self.proposal_fallbacks.store(0, Ordering::Relaxed);
        self.critic_stubs.store(0, Ordering::Relaxed);
    }
}
