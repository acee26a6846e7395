//! Shared engine state
//!
//! Read-side mirror of what the engine owns, for HTTP handlers, plus the
//! event broadcaster behind the SSE stream. Only the engine task writes the
//! stage and dataset fields.

use reel_common::{Dataset, ReelEvent, Stage};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Event channel capacity; slow SSE subscribers lag rather than block
const EVENT_BUFFER: usize = 256;

/// Shared state accessible by all components
pub struct SharedState {
    /// Current stage (mirrors the stage machine)
    pub stage: RwLock<Stage>,

    /// Dataset once fetched and parsed
    pub dataset: RwLock<Option<Arc<Dataset>>>,

    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<ReelEvent>,
}

impl SharedState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            stage: RwLock::new(Stage::Password),
            dataset: RwLock::new(None),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: ReelEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<ReelEvent> {
        self.event_tx.subscribe()
    }

    pub async fn get_stage(&self) -> Stage {
        *self.stage.read().await
    }

    pub async fn set_stage(&self, stage: Stage) {
        *self.stage.write().await = stage;
    }

    pub async fn get_dataset(&self) -> Option<Arc<Dataset>> {
        self.dataset.read().await.clone()
    }

    pub async fn set_dataset(&self, dataset: Arc<Dataset>) {
        *self.dataset.write().await = Some(dataset);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
