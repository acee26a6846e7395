//! Internal engine messages (not exposed via SSE)
//!
//! Triggers from handles, stage timers and the dataset fetch all reach the
//! engine task as messages. Outward state changes are published separately
//! as `reel_common::ReelEvent`.

use reel_common::{Dataset, Stage};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

/// External transition trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Passphrase accepted
    Authenticate,
    /// Explicit start from `ready`
    Start,
    /// Complete the current stage now
    Skip,
    /// Active segment finished
    Advance,
    /// Read-only query
    Snapshot,
}

/// Trigger plus the reply slot for the post-transition snapshot
#[derive(Debug)]
pub struct EngineCommand {
    pub trigger: Trigger,
    pub reply: oneshot::Sender<EngineSnapshot>,
}

/// Stage timer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Pause between loading complete and `ready`
    Settle,
    /// Auto-advance from `hook` to `slides`
    HookAdvance,
}

/// Messages the engine sends to itself
#[derive(Debug)]
pub enum InternalMessage {
    /// A stage timer elapsed; ignored unless `epoch` is still current
    Timer { epoch: u64, kind: TimerKind },

    /// Dataset fetch finished
    Dataset(Result<Arc<Dataset>, String>),
}

/// Post-transition view of the engine, returned by every trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub stage: Stage,
    /// Slide cursor, only in `slides`
    pub slide_index: Option<usize>,
    pub segment_id: Option<String>,
    /// Resolved background media reference
    pub background: Option<String>,
    /// Most recently requested audio (None = silence)
    pub audio_target: Option<String>,
    /// Aggregate preload progress, 0-100
    pub progress: f64,
    pub assets_completed: usize,
    pub assets_total: usize,
    pub loading_complete: bool,
    pub dataset_ready: bool,
    /// Reason the engine is holding position, if it is
    pub stalled: Option<String>,
    /// Message shown on the hook screen
    pub hook_message: Option<String>,
}
