//! Stage machine
//!
//! Single source of truth for the current stage and slide cursor:
//!
//! ```text
//! password -> loading -> ready -> hook -> slides[0..N-1] -> dashboard
//! ```
//!
//! The machine is driven from one engine task and never blocks. Each
//! transition resolves the active segment through the sequencer, resolves
//! its media through `ResolvedAssets` and retargets the crossfade
//! controller.
//!
//! # Timers
//!
//! Stage timers (settle delay, hook auto-advance) run as tasks bound to the
//! current stage's `CancellationToken` and tagged with its epoch. Leaving a
//! stage cancels the token and bumps the epoch, so a timer message that was
//! already queued is dropped on arrival.
//!
//! # Missing dataset
//!
//! Stages that render dataset content are never entered without it. The
//! machine holds its position, records the reason and publishes `Stalled`.

use crate::audio::crossfade::CrossfadeController;
use crate::config::{DashboardConfig, ShowConfig, TimingConfig};
use crate::loader::{fetch_to_end, AssetLoader, LoaderEvent, ProgressiveFetch, ResolvedAssets};
use crate::playback::events::{EngineSnapshot, InternalMessage, TimerKind, Trigger};
use crate::playback::sequencer::{Segment, SlideSequencer};
use crate::state::SharedState;
use reel_common::{time, Dataset, ReelEvent, Stage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Preload bookkeeping mirrored from loader events
#[derive(Debug, Default, Clone)]
struct LoadStatus {
    percent: f64,
    completed: usize,
    total: usize,
    complete: bool,
}

/// Finite-state controller for the show
pub struct StageMachine {
    sequencer: SlideSequencer,
    timing: TimingConfig,
    dashboard: DashboardConfig,
    manifest: Vec<String>,
    dataset_ref: String,

    stage: Stage,
    cursor: usize,
    epoch: u64,
    stage_timer: CancellationToken,
    settle_pending: bool,

    load: LoadStatus,
    dataset: Option<Arc<Dataset>>,
    stalled: Option<String>,
    hook_message: Option<String>,

    audio: CrossfadeController,
    loader: AssetLoader,
    assets: ResolvedAssets,
    fetcher: Arc<dyn ProgressiveFetch>,
    shared: Arc<SharedState>,
    internal_tx: mpsc::UnboundedSender<InternalMessage>,
    loader_tx: mpsc::UnboundedSender<LoaderEvent>,
}

impl StageMachine {
    pub fn new(
        config: &ShowConfig,
        fetcher: Arc<dyn ProgressiveFetch>,
        audio: CrossfadeController,
        shared: Arc<SharedState>,
        internal_tx: mpsc::UnboundedSender<InternalMessage>,
        loader_tx: mpsc::UnboundedSender<LoaderEvent>,
    ) -> Self {
        let loader = AssetLoader::new(Arc::clone(&fetcher), config.progress.policy.clone());
        let assets = loader.assets();

        Self {
            sequencer: SlideSequencer::new(config.segments.clone()),
            timing: config.timing.clone(),
            dashboard: config.dashboard.clone(),
            manifest: config.manifest.clone(),
            dataset_ref: config.dataset.clone(),
            stage: Stage::Password,
            cursor: 0,
            epoch: 0,
            stage_timer: CancellationToken::new(),
            settle_pending: false,
            load: LoadStatus {
                total: config.manifest.len(),
                ..Default::default()
            },
            dataset: None,
            stalled: None,
            hook_message: None,
            audio,
            loader,
            assets,
            fetcher,
            shared,
            internal_tx,
            loader_tx,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn assets(&self) -> ResolvedAssets {
        self.assets.clone()
    }

    /// Apply an external trigger
    pub fn trigger(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::Authenticate => self.authenticate(),
            Trigger::Start => self.start(),
            Trigger::Skip => self.skip(),
            Trigger::Advance => self.advance(),
            Trigger::Snapshot => {}
        }
    }

    /// `password -> loading`
    pub fn authenticate(&mut self) {
        if self.stage != Stage::Password {
            debug!(stage = %self.stage, "Authenticate ignored");
            return;
        }
        self.enter(Stage::Loading);
        self.begin_loading();
    }

    /// `ready -> hook`
    pub fn start(&mut self) {
        if self.stage != Stage::Ready {
            debug!(stage = %self.stage, "Start ignored");
            return;
        }
        let Some(dataset) = self.dataset.clone() else {
            self.stall("dataset unavailable, holding at ready");
            return;
        };

        self.emit(ReelEvent::Celebrate {
            timestamp: time::now(),
        });

        self.hook_message = dataset
            .pick_hook_message(&mut rand::thread_rng())
            .map(|m| m.message.clone());

        self.enter(Stage::Hook);

        let audio = self.sequencer.first().and_then(|s| s.audio.clone());
        self.retarget(audio.as_deref(), self.timing.intro_fade());
        self.schedule(TimerKind::HookAdvance, self.timing.hook_duration());
    }

    /// Complete the current stage now
    ///
    /// Collapses any pending timer for the stage. Stages with nothing to
    /// complete ignore it.
    pub fn skip(&mut self) {
        match self.stage {
            Stage::Loading if self.settle_pending => self.enter(Stage::Ready),
            Stage::Ready => self.start(),
            Stage::Hook => self.enter_slides(),
            Stage::Slides => self.advance(),
            stage => debug!(stage = %stage, "Skip ignored"),
        }
    }

    /// Move past the active segment
    ///
    /// Increments the cursor, or enters `dashboard` from the last segment.
    /// Ignored outside `slides`, so extra calls after the last segment are
    /// absorbed.
    pub fn advance(&mut self) {
        if self.stage != Stage::Slides {
            debug!(stage = %self.stage, "Advance ignored");
            return;
        }

        match self.sequencer.next(self.cursor) {
            Some(next) => {
                self.cursor = next;
                self.enter(Stage::Slides);
                let audio = self.segment_audio(self.cursor);
                self.retarget(audio.as_deref(), self.timing.segment_fade());
            }
            None => self.enter_dashboard(),
        }
    }

    /// Handle a timer, dataset or loader message
    pub fn handle_internal(&mut self, message: InternalMessage) {
        match message {
            InternalMessage::Timer { epoch, kind } => self.on_timer(epoch, kind),
            InternalMessage::Dataset(result) => self.on_dataset(result),
        }
    }

    pub fn handle_loader(&mut self, event: LoaderEvent) {
        match event {
            LoaderEvent::Progress {
                percent,
                completed,
                total,
            } => {
                self.load.percent = self.load.percent.max(percent);
                self.load.completed = completed;
                self.load.total = total;
                self.emit(ReelEvent::LoadProgress {
                    percent: self.load.percent,
                    completed,
                    total,
                    timestamp: time::now(),
                });
            }
            LoaderEvent::Resolved { source_ref, uri } => {
                self.emit(ReelEvent::AssetResolved {
                    source_ref,
                    uri,
                    timestamp: time::now(),
                });
            }
            LoaderEvent::Failed { source_ref, reason } => {
                self.emit(ReelEvent::AssetFailed {
                    source_ref,
                    reason,
                    timestamp: time::now(),
                });
            }
            LoaderEvent::Complete { resolved, failed } => {
                self.load.complete = true;
                self.load.percent = 100.0;
                self.load.completed = resolved + failed;
                self.emit(ReelEvent::LoadingComplete {
                    resolved,
                    failed,
                    timestamp: time::now(),
                });
                self.check_loading_done();
            }
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let segment = self.active_segment();
        EngineSnapshot {
            stage: self.stage,
            slide_index: (self.stage == Stage::Slides).then_some(self.cursor),
            segment_id: segment.map(|s| s.id.clone()),
            background: segment.map(|s| self.assets.resolve(&s.background)),
            audio_target: self.audio.snapshot().target,
            progress: self.load.percent,
            assets_completed: self.load.completed,
            assets_total: self.load.total,
            loading_complete: self.load.complete,
            dataset_ready: self.dataset.is_some(),
            stalled: self.stalled.clone(),
            hook_message: self.hook_message.clone(),
        }
    }

    /// Cancel pending stage timers
    pub fn shutdown(&mut self) {
        self.stage_timer.cancel();
    }

    fn begin_loading(&mut self) {
        self.loader.load(&self.manifest, self.loader_tx.clone());

        let fetcher = Arc::clone(&self.fetcher);
        let dataset_ref = self.dataset_ref.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = match fetch_to_end(fetcher.as_ref(), &dataset_ref).await {
                Ok(asset) => Dataset::from_slice(&asset.bytes)
                    .map(Arc::new)
                    .map_err(|e| e.to_string()),
                Err(reason) => Err(reason),
            };
            let _ = tx.send(InternalMessage::Dataset(result));
        });
    }

    fn on_dataset(&mut self, result: Result<Arc<Dataset>, String>) {
        match result {
            Ok(dataset) => {
                info!(total_messages = dataset.meta.total_messages, "Dataset ready");
                self.emit(ReelEvent::DatasetReady {
                    total_messages: dataset.meta.total_messages,
                    timestamp: time::now(),
                });
                self.dataset = Some(dataset);
                self.check_loading_done();
            }
            Err(reason) => {
                error!(dataset = %self.dataset_ref, reason = %reason, "Dataset unavailable");
                self.stall(&format!("dataset unavailable: {}", reason));
            }
        }
    }

    /// Schedule `loading -> ready` once assets and dataset are both in
    fn check_loading_done(&mut self) {
        if self.stage != Stage::Loading || self.settle_pending {
            return;
        }
        if !self.load.complete || self.dataset.is_none() {
            return;
        }
        self.settle_pending = true;
        self.schedule(TimerKind::Settle, self.timing.settle_delay());
    }

    fn on_timer(&mut self, epoch: u64, kind: TimerKind) {
        if epoch != self.epoch {
            debug!(?kind, epoch, current = self.epoch, "Stale timer ignored");
            return;
        }
        match (kind, self.stage) {
            (TimerKind::Settle, Stage::Loading) => self.enter(Stage::Ready),
            (TimerKind::HookAdvance, Stage::Hook) => self.enter_slides(),
            (kind, stage) => debug!(?kind, stage = %stage, "Timer does not apply"),
        }
    }

    fn enter_slides(&mut self) {
        if self.dataset.is_none() {
            self.stall("dataset unavailable, holding at hook");
            return;
        }
        self.cursor = 0;
        self.enter(Stage::Slides);
        let audio = self.segment_audio(0);
        self.retarget(audio.as_deref(), self.timing.segment_fade());
    }

    fn enter_dashboard(&mut self) {
        if self.dataset.is_none() {
            self.stall("dataset unavailable, holding at last slide");
            return;
        }
        self.enter(Stage::Dashboard);
        if !self.dashboard.keep_audio {
            self.retarget(None, self.timing.segment_fade());
        }
    }

    /// Switch stage (or re-enter `slides`), cancelling the old stage's timers
    fn enter(&mut self, stage: Stage) {
        self.stage_timer.cancel();
        self.stage_timer = CancellationToken::new();
        self.epoch += 1;
        self.settle_pending = false;
        self.stalled = None;
        self.stage = stage;

        let snapshot = self.snapshot();
        info!(
            stage = %stage,
            slide_index = ?snapshot.slide_index,
            segment = ?snapshot.segment_id,
            "Stage changed"
        );
        self.emit(ReelEvent::StageChanged {
            stage,
            slide_index: snapshot.slide_index,
            segment_id: snapshot.segment_id,
            background: snapshot.background,
            timestamp: time::now(),
        });
    }

    fn schedule(&self, kind: TimerKind, after: Duration) {
        let token = self.stage_timer.clone();
        let epoch = self.epoch;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let _ = tx.send(InternalMessage::Timer { epoch, kind });
                }
            }
        });
    }

    fn stall(&mut self, reason: &str) {
        warn!(stage = %self.stage, reason, "Stalled");
        self.stalled = Some(reason.to_string());
        self.emit(ReelEvent::Stalled {
            stage: self.stage,
            reason: reason.to_string(),
            timestamp: time::now(),
        });
    }

    fn retarget(&mut self, source_ref: Option<&str>, fade: Duration) {
        let resolved = source_ref.map(|r| self.assets.resolve(r));
        if self.audio.retarget(resolved.as_deref(), fade) {
            self.emit(ReelEvent::AudioTargetChanged {
                source: resolved,
                fade_ms: fade.as_millis() as u64,
                timestamp: time::now(),
            });
        }
    }

    /// Segment the presentational layer renders now
    fn active_segment(&self) -> Option<&Segment> {
        match self.stage {
            Stage::Hook => self.sequencer.first(),
            Stage::Slides => self.sequencer.current(self.cursor),
            _ => None,
        }
    }

    fn segment_audio(&self, cursor: usize) -> Option<String> {
        self.sequencer.current(cursor).and_then(|s| s.audio.clone())
    }

    fn emit(&self, event: ReelEvent) {
        self.shared.broadcast_event(event);
    }
}

impl Drop for StageMachine {
    fn drop(&mut self) {
        self.stage_timer.cancel();
    }
}
