//! Show engine task
//!
//! One tokio task owns the `StageMachine`. Handles send triggers over an
//! mpsc channel and get the post-transition snapshot back on a oneshot;
//! loader events, stage timers and the dataset fetch arrive on the engine's
//! own channels. Commands are polled first, so an explicit trigger always
//! lands before a timer message queued behind it.

use crate::audio::crossfade::CrossfadeController;
use crate::audio::output::AudioOutput;
use crate::config::ShowConfig;
use crate::error::{Error, Result};
use crate::loader::{LoaderEvent, ProgressiveFetch, ResolvedAssets};
use crate::playback::events::{EngineCommand, EngineSnapshot, InternalMessage, Trigger};
use crate::playback::stage_machine::StageMachine;
use crate::state::SharedState;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Pending trigger queue per engine
const COMMAND_BUFFER: usize = 32;

/// Cloneable handle for driving the engine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    assets: ResolvedAssets,
}

impl EngineHandle {
    /// Passphrase accepted: leave `password`
    pub async fn authenticate(&self) -> Result<EngineSnapshot> {
        self.send(Trigger::Authenticate).await
    }

    /// Explicit start from `ready`
    pub async fn start(&self) -> Result<EngineSnapshot> {
        self.send(Trigger::Start).await
    }

    /// Complete the current stage now
    pub async fn skip(&self) -> Result<EngineSnapshot> {
        self.send(Trigger::Skip).await
    }

    /// Active segment finished
    pub async fn advance(&self) -> Result<EngineSnapshot> {
        self.send(Trigger::Advance).await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        self.send(Trigger::Snapshot).await
    }

    /// Read handle over preloaded assets
    pub fn assets(&self) -> &ResolvedAssets {
        &self.assets
    }

    async fn send(&self, trigger: Trigger) -> Result<EngineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand { trigger, reply })
            .await
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)
    }
}

/// Playback orchestration engine
pub struct ShowEngine {
    machine: StageMachine,
    shared: Arc<SharedState>,
    command_rx: mpsc::Receiver<EngineCommand>,
    internal_rx: mpsc::UnboundedReceiver<InternalMessage>,
    loader_rx: mpsc::UnboundedReceiver<LoaderEvent>,
}

impl ShowEngine {
    /// Spawn the engine task
    ///
    /// The task runs until every `EngineHandle` is dropped.
    pub fn spawn(
        config: &ShowConfig,
        fetcher: Arc<dyn ProgressiveFetch>,
        output: Box<dyn AudioOutput>,
        shared: Arc<SharedState>,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (loader_tx, loader_rx) = mpsc::unbounded_channel();

        let audio = CrossfadeController::new(
            output,
            config.timing.ramp_settings(),
            Arc::clone(&shared),
        );
        let machine = StageMachine::new(
            config,
            fetcher,
            audio,
            Arc::clone(&shared),
            internal_tx,
            loader_tx,
        );

        let handle = EngineHandle {
            tx,
            assets: machine.assets(),
        };

        let engine = ShowEngine {
            machine,
            shared,
            command_rx,
            internal_rx,
            loader_rx,
        };

        (handle, tokio::spawn(engine.run()))
    }

    async fn run(mut self) {
        info!(
            manifest_entries = self.machine.snapshot().assets_total,
            "Show engine started"
        );

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => {
                    let Some(EngineCommand { trigger, reply }) = command else {
                        break;
                    };
                    debug!(?trigger, stage = %self.machine.stage(), "Trigger");
                    self.machine.trigger(trigger);
                    self.sync_shared().await;
                    let _ = reply.send(self.machine.snapshot());
                }

                Some(message) = self.internal_rx.recv() => {
                    self.machine.handle_internal(message);
                    self.sync_shared().await;
                }

                Some(event) = self.loader_rx.recv() => {
                    self.machine.handle_loader(event);
                    self.sync_shared().await;
                }
            }
        }

        self.machine.shutdown();
        info!("Show engine stopped");
    }

    /// Mirror stage and dataset for HTTP handlers before replying
    async fn sync_shared(&self) {
        let stage = self.machine.stage();
        if self.shared.get_stage().await != stage {
            self.shared.set_stage(stage).await;
        }
        if let Some(dataset) = self.machine.dataset() {
            if self.shared.get_dataset().await.is_none() {
                self.shared.set_dataset(Arc::clone(dataset)).await;
            }
        }
    }
}
