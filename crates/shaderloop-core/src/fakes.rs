//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `ScriptedProposer`, `FakeRenderer`, `FakeCritic` and
//! `ScriptedMetric`, which satisfy the trait contracts without a GPU, a
//! network connection or any external process.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use crate::collaborators::*;
use crate::domain::{source_digest, Frame, RankDirection};

/// Sources containing this marker fail to compile in [`FakeRenderer`].
pub const BROKEN_MARKER: &str = "FAKE_COMPILE_ERROR";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

type Scripted = Result<Proposal, ProposalError>;

// ---------------------------------------------------------------------------
// ScriptedProposer
// ---------------------------------------------------------------------------

/// Proposer that replays queued replies per path.
///
/// When a queue runs dry the `repeat` reply is used if set, otherwise the
/// call fails with `ProposalError::NotConfigured`. Every request is captured
/// for later inspection.
#[derive(Debug, Default)]
pub struct ScriptedProposer {
    initial: Mutex<VecDeque<Scripted>>,
    edits: Mutex<VecDeque<Scripted>>,
    repairs: Mutex<VecDeque<Scripted>>,
    repeat: Option<Scripted>,
    initial_requests: Mutex<Vec<InitialRequest>>,
    edit_requests: Mutex<Vec<EditRequest>>,
    repair_requests: Mutex<Vec<RepairRequest>>,
}

impl ScriptedProposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call on every path with `reply`.
    pub fn always(reply: Scripted) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::default()
        }
    }

    pub fn with_initial(self, replies: Vec<Scripted>) -> Self {
        *lock(&self.initial) = replies.into();
        self
    }

    pub fn with_edits(self, replies: Vec<Scripted>) -> Self {
        *lock(&self.edits) = replies.into();
        self
    }

    pub fn with_repairs(self, replies: Vec<Scripted>) -> Self {
        *lock(&self.repairs) = replies.into();
        self
    }

    pub fn initial_requests(&self) -> Vec<InitialRequest> {
        lock(&self.initial_requests).clone()
    }

    pub fn edit_requests(&self) -> Vec<EditRequest> {
        lock(&self.edit_requests).clone()
    }

    pub fn repair_requests(&self) -> Vec<RepairRequest> {
        lock(&self.repair_requests).clone()
    }

    fn next(&self, queue: &Mutex<VecDeque<Scripted>>) -> Scripted {
        lock(queue)
            .pop_front()
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| {
                Err(ProposalError::NotConfigured(
                    "scripted proposer exhausted".to_string(),
                ))
            })
    }
}

#[async_trait]
impl Proposer for ScriptedProposer {
    async fn propose_initial(&self, request: &InitialRequest) -> Result<Proposal, ProposalError> {
        lock(&self.initial_requests).push(request.clone());
        self.next(&self.initial)
    }

    async fn propose_edit(&self, request: &EditRequest) -> Result<Proposal, ProposalError> {
        lock(&self.edit_requests).push(request.clone());
        self.next(&self.edits)
    }

    async fn repair(&self, request: &RepairRequest) -> Result<Proposal, ProposalError> {
        lock(&self.repair_requests).push(request.clone());
        self.next(&self.repairs)
    }
}

// ---------------------------------------------------------------------------
// FakeRenderer
// ---------------------------------------------------------------------------

/// Deterministic software stand-in for a GPU renderer.
///
/// Each source renders to a stripe pattern derived from its digest, shifted
/// by the frame time, so different sources score differently and frames of
/// one iteration differ. Sources containing [`BROKEN_MARKER`] fail with a
/// compile error.
#[derive(Debug, Default)]
pub struct FakeRenderer {
    offline: bool,
    calls: AtomicUsize,
    rendered: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer whose context can never be acquired.
    pub fn broken() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Number of render attempts so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sources that rendered successfully, in order.
    pub fn rendered_sources(&self) -> Vec<String> {
        lock(&self.rendered).clone()
    }
}

/// Render the stripe pattern for `source` at time `t`.
pub fn stripe_pattern(source: &str, width: u32, height: u32, t: f32) -> RgbImage {
    let digest = source_digest(source);
    let bytes = digest.as_bytes();
    let period = 2 + (bytes[0] as u32 % 7);
    let shift = (t * period as f32).round() as u32;
    let base = [bytes[1], bytes[2], bytes[3]];

    RgbImage::from_fn(width, height, |x, y| {
        if ((x + shift) / period + y / (period + 1)) % 2 == 0 {
            Rgb(base)
        } else {
            Rgb([255 - base[0], 255 - base[1], 255 - base[2]])
        }
    })
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<Frame>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(RenderError::Context("fake renderer offline".to_string()));
        }
        if request.source.contains(BROKEN_MARKER) {
            return Err(RenderError::Compile(
                "0:1(1): error: fake compile failure".to_string(),
            ));
        }

        let (w, h) = request.resolution;
        let frames = request
            .frame_times()
            .into_iter()
            .map(|t| Frame::new(stripe_pattern(request.source, w, h, t), t))
            .collect();
        lock(&self.rendered).push(request.source.to_string());
        Ok(frames)
    }
}

// ---------------------------------------------------------------------------
// FakeCritic
// ---------------------------------------------------------------------------

/// Critic that returns fixed text, or is disabled.
#[derive(Debug, Default)]
pub struct FakeCritic {
    text: Option<String>,
    discovery: Option<String>,
    calls: AtomicUsize,
}

impl FakeCritic {
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_discovery(mut self, text: impl Into<String>) -> Self {
        self.discovery = Some(text.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Critic for FakeCritic {
    async fn critique(&self, _target: &RgbImage, _output: &RgbImage) -> Result<String, CriticError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| CriticError::Disabled("fake critic disabled".to_string()))
    }

    async fn discover(
        &self,
        _target: &RgbImage,
        _reference_context: Option<&str>,
    ) -> Result<String, CriticError> {
        self.discovery
            .clone()
            .ok_or_else(|| CriticError::Disabled("no discovery scripted".to_string()))
    }
}

// ---------------------------------------------------------------------------
// ScriptedMetric
// ---------------------------------------------------------------------------

/// External metric replaying queued values; `None` entries are unavailable.
#[derive(Debug)]
pub struct ScriptedMetric {
    name: String,
    direction: RankDirection,
    values: Mutex<VecDeque<Option<f64>>>,
}

impl ScriptedMetric {
    pub fn new(name: impl Into<String>, direction: RankDirection, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            direction,
            values: Mutex::new(values.into()),
        }
    }
}

#[async_trait]
impl PerceptualMetric for ScriptedMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn direction(&self) -> RankDirection {
        self.direction
    }

    async fn measure(&self, _target: &RgbImage, _frame: &Frame) -> Result<f64, MetricError> {
        match lock(&self.values).pop_front().flatten() {
            Some(v) => Ok(v),
            None => Err(MetricError::Unavailable("no scripted value".to_string())),
        }
    }
}
