//! Concurrent asset preloader
//!
//! `AssetLoader::load` opens one progressive fetch per manifest entry, all
//! running concurrently. A single collector task owns the `LoadTracker` and
//! is the only writer of `ResolvedAssets`; entry tasks just forward their
//! fetch events to it. Completion is count-based: `Complete` fires exactly
//! once, when every entry has settled, whatever order they settle in.

pub mod assets;
pub mod fetch;
pub mod progress;

pub use assets::{AssetHandle, ResolvedAssets};
pub use fetch::{fetch_to_end, FetchEvent, FetchedAsset, HttpFetcher, ProgressiveFetch};
pub use progress::{LoadTracker, ProgressPolicy};

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Loader output, consumed by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    /// Aggregate progress moved (0-100)
    Progress {
        percent: f64,
        completed: usize,
        total: usize,
    },

    /// Entry downloaded; `uri` is its local handle
    Resolved { source_ref: String, uri: String },

    /// Entry failed; no handle is published for it
    Failed { source_ref: String, reason: String },

    /// Every entry settled
    Complete { resolved: usize, failed: usize },
}

/// Preloads a manifest and publishes resolved handles
pub struct AssetLoader {
    fetcher: Arc<dyn ProgressiveFetch>,
    assets: ResolvedAssets,
    policy: ProgressPolicy,
}

impl AssetLoader {
    pub fn new(fetcher: Arc<dyn ProgressiveFetch>, policy: ProgressPolicy) -> Self {
        Self {
            fetcher,
            assets: ResolvedAssets::new(),
            policy,
        }
    }

    /// Read handle over the assets this loader publishes
    pub fn assets(&self) -> ResolvedAssets {
        self.assets.clone()
    }

    /// Start fetching every manifest entry
    ///
    /// Returns the collector task; it finishes after sending `Complete`.
    /// No retries: a failed entry is final.
    pub fn load(
        &self,
        manifest: &[String],
        events: mpsc::UnboundedSender<LoaderEvent>,
    ) -> JoinHandle<()> {
        let total = manifest.len();
        info!(entries = total, "Starting asset preload");

        let (entry_tx, entry_rx) = mpsc::unbounded_channel::<(usize, FetchEvent)>();

        for (index, source_ref) in manifest.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let source_ref = source_ref.clone();
            let entry_tx = entry_tx.clone();

            tokio::spawn(async move {
                let mut stream = fetcher.fetch(&source_ref);
                while let Some(event) = stream.next().await {
                    let terminal = event.is_terminal();
                    if entry_tx.send((index, event)).is_err() || terminal {
                        return;
                    }
                }
                let _ = entry_tx.send((
                    index,
                    FetchEvent::Failed("fetch ended without a result".to_string()),
                ));
            });
        }
        drop(entry_tx);

        let collector = Collector {
            manifest: manifest.to_vec(),
            tracker: LoadTracker::new(manifest, self.policy.clone()),
            assets: self.assets.clone(),
            events,
        };
        tokio::spawn(collector.run(entry_rx))
    }
}

struct Collector {
    manifest: Vec<String>,
    tracker: LoadTracker,
    assets: ResolvedAssets,
    events: mpsc::UnboundedSender<LoaderEvent>,
}

impl Collector {
    async fn run(mut self, mut entry_rx: mpsc::UnboundedReceiver<(usize, FetchEvent)>) {
        while !self.tracker.is_complete() {
            let Some((index, event)) = entry_rx.recv().await else {
                break;
            };
            self.handle(index, event);
        }

        // Entry tasks that vanished (panicked) without a terminal event
        // still count toward completion.
        for index in 0..self.manifest.len() {
            if !self.tracker.entries()[index].is_settled() {
                self.handle(
                    index,
                    FetchEvent::Failed("fetch task ended unexpectedly".to_string()),
                );
            }
        }

        let failed = self.tracker.failed();
        let resolved = self.tracker.total() - failed;
        info!(resolved, failed, "Asset preload complete");
        let _ = self.events.send(LoaderEvent::Complete { resolved, failed });
    }

    fn handle(&mut self, index: usize, event: FetchEvent) {
        let Some(source_ref) = self.manifest.get(index).cloned() else {
            return;
        };

        match event {
            FetchEvent::Progress { received, total } => {
                if let Some(percent) = self.tracker.record_progress(index, received, total) {
                    debug!(source_ref = %source_ref, received, ?total, percent, "Preload progress");
                    self.send_progress(percent);
                }
            }
            FetchEvent::Complete(asset) => {
                if !self.tracker.settle(index, true) {
                    return;
                }
                let handle = self
                    .assets
                    .publish(&source_ref, asset.bytes, asset.content_type);
                debug!(source_ref = %source_ref, uri = %handle.uri, "Asset resolved");
                let _ = self.events.send(LoaderEvent::Resolved {
                    source_ref,
                    uri: handle.uri.clone(),
                });
                self.send_progress(self.tracker.percent());
            }
            FetchEvent::Failed(reason) => {
                if !self.tracker.settle(index, false) {
                    return;
                }
                warn!(source_ref = %source_ref, reason = %reason, "Asset fetch failed, using remote reference");
                let _ = self.events.send(LoaderEvent::Failed { source_ref, reason });
                self.send_progress(self.tracker.percent());
            }
        }
    }

    fn send_progress(&self, percent: f64) {
        let _ = self.events.send(LoaderEvent::Progress {
            percent,
            completed: self.tracker.completed(),
            total: self.tracker.total(),
        });
    }
}
