//! Test helper modules for reel-player integration tests
//!
//! - `FakeFetcher`: scripted `ProgressiveFetch`, per reference either an
//!   immediate event list or a stream the test drives by hand
//! - `RecordingOutput`: `AudioOutput` that records every call and can be
//!   told to fail `play` for chosen sources
//! - Engine setup with the stock show and a small dataset fixture

#![allow(dead_code)]

use futures::stream::{self, BoxStream, StreamExt};
use reel_player::audio::AudioOutput;
use reel_player::config::ShowConfig;
use reel_player::loader::{FetchEvent, FetchedAsset, ProgressiveFetch};
use reel_player::playback::EngineSnapshot;
use reel_player::{EngineHandle, Error, SharedState, ShowEngine};
use reel_common::Stage;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

// ============================================================================
// FakeFetcher
// ============================================================================

enum Script {
    Events(Vec<FetchEvent>),
    Driven(Option<mpsc::UnboundedReceiver<FetchEvent>>),
}

/// Scripted progressive fetch
///
/// Unscripted references fail with "not found".
#[derive(Default)]
pub struct FakeFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` in two progress steps with a known total
    pub fn respond(&self, source_ref: &str, bytes: &[u8], content_type: &str) {
        let total = bytes.len() as u64;
        self.script(
            source_ref,
            vec![
                FetchEvent::Progress {
                    received: total / 2,
                    total: Some(total),
                },
                FetchEvent::Progress {
                    received: total,
                    total: Some(total),
                },
                FetchEvent::Complete(FetchedAsset {
                    bytes: bytes.to_vec(),
                    content_type: Some(content_type.to_string()),
                }),
            ],
        );
    }

    pub fn respond_json(&self, source_ref: &str, value: &serde_json::Value) {
        let bytes = serde_json::to_vec(value).unwrap();
        self.respond(source_ref, &bytes, "application/json");
    }

    pub fn fail(&self, source_ref: &str, reason: &str) {
        self.script(source_ref, vec![FetchEvent::Failed(reason.to_string())]);
    }

    /// Exact event list (may omit the terminal event)
    pub fn script(&self, source_ref: &str, events: Vec<FetchEvent>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(source_ref.to_string(), Script::Events(events));
    }

    /// Stream driven by the returned sender; dropping it ends the stream
    pub fn driven(&self, source_ref: &str) -> mpsc::UnboundedSender<FetchEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts
            .lock()
            .unwrap()
            .insert(source_ref.to_string(), Script::Driven(Some(rx)));
        tx
    }

    /// References fetched so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ProgressiveFetch for FakeFetcher {
    fn fetch(&self, source_ref: &str) -> BoxStream<'static, FetchEvent> {
        self.requests.lock().unwrap().push(source_ref.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(source_ref) {
            Some(Script::Events(events)) => stream::iter(events.clone()).boxed(),
            Some(Script::Driven(rx)) => match rx.take() {
                Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
                None => stream::iter(vec![FetchEvent::Failed("already fetched".into())]).boxed(),
            },
            None => stream::iter(vec![FetchEvent::Failed("not found".into())]).boxed(),
        }
    }
}

// ============================================================================
// RecordingOutput
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Load(String),
    Play(String),
    PlayFailed(String),
    Pause,
    Volume(f32),
}

/// Recording audio output; clones share the same log
#[derive(Clone, Default)]
pub struct RecordingOutput {
    calls: Arc<Mutex<Vec<OutputCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    loaded: Arc<Mutex<Option<String>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_play_for(&self, source: &str) {
        self.failing.lock().unwrap().insert(source.to_string());
    }

    pub fn allow_play_for(&self, source: &str) {
        self.failing.lock().unwrap().remove(source);
    }

    pub fn calls(&self) -> Vec<OutputCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Sources successfully started, in order
    pub fn played(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                OutputCall::Play(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Gains set while `source` was the playing source
    pub fn gains_for(&self, source: &str) -> Vec<f32> {
        let mut playing: Option<String> = None;
        let mut gains = Vec::new();
        for call in self.calls() {
            match call {
                OutputCall::Play(s) => playing = Some(s),
                OutputCall::Pause | OutputCall::PlayFailed(_) => playing = None,
                OutputCall::Volume(g) if playing.as_deref() == Some(source) => gains.push(g),
                _ => {}
            }
        }
        gains
    }

    /// Highest gain ever set
    pub fn peak_gain(&self) -> f32 {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                OutputCall::Volume(g) => Some(g),
                _ => None,
            })
            .fold(0.0, f32::max)
    }
}

impl AudioOutput for RecordingOutput {
    fn load(&mut self, source: &str) {
        *self.loaded.lock().unwrap() = Some(source.to_string());
        self.calls.lock().unwrap().push(OutputCall::Load(source.to_string()));
    }

    fn play(&mut self) -> reel_player::Result<()> {
        let source = self.loaded.lock().unwrap().clone().unwrap_or_default();
        if self.failing.lock().unwrap().contains(&source) {
            self.calls.lock().unwrap().push(OutputCall::PlayFailed(source));
            return Err(Error::AudioOutput("autoplay blocked".to_string()));
        }
        self.calls.lock().unwrap().push(OutputCall::Play(source));
        Ok(())
    }

    fn pause(&mut self) {
        *self.loaded.lock().unwrap() = None;
        self.calls.lock().unwrap().push(OutputCall::Pause);
    }

    fn set_volume(&mut self, gain: f32) {
        self.calls.lock().unwrap().push(OutputCall::Volume(gain));
    }
}

// ============================================================================
// Engine setup
// ============================================================================

pub fn sample_dataset() -> serde_json::Value {
    serde_json::json!({
        "meta": { "total_messages": 4, "start_date": "2023-01-01", "end_date": "2024-12-31" },
        "wrapped": {
            "sweetest": [
                {
                    "message": "You make every ordinary Tuesday feel like the best day of the year",
                    "timestamp": "2024-02-14 09:12:00",
                    "sender": "A"
                }
            ],
            "funniest": [
                { "message": "who ate my noodles", "timestamp": "2024-03-02 21:00:00", "sender": "B" }
            ],
            "timeline": [ { "month_year": "Feb 2024", "count": 3 } ]
        },
        "search_index": [
            { "message": "Happy valentines!", "timestamp": "2023-02-14 08:00:00", "sender": "A" },
            { "message": "valentines dinner?", "timestamp": "2024-02-14 19:30:00", "sender": "B" },
            { "message": "who ate my noodles", "timestamp": "2024-03-02 21:00:00", "sender": "B" },
            { "message": "", "timestamp": "2024-03-03 10:00:00", "sender": "A" }
        ]
    })
}

/// Fetcher serving the stock manifest and dataset
pub fn stock_fetcher() -> FakeFetcher {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/bg-video.mp4", &[7u8; 1000], "video/mp4");
    fetcher.respond("/music-intro.mp3", &[3u8; 100], "audio/mpeg");
    fetcher.respond_json("/data.json", &sample_dataset());
    fetcher
}

pub struct TestEngine {
    pub handle: EngineHandle,
    pub task: JoinHandle<()>,
    pub shared: Arc<SharedState>,
    pub output: RecordingOutput,
}

pub fn spawn_engine(config: &ShowConfig, fetcher: FakeFetcher) -> TestEngine {
    let shared = Arc::new(SharedState::new());
    let output = RecordingOutput::new();
    let (handle, task) = ShowEngine::spawn(
        config,
        Arc::new(fetcher),
        Box::new(output.clone()),
        Arc::clone(&shared),
    );
    TestEngine {
        handle,
        task,
        shared,
        output,
    }
}

/// Poll snapshots until `stage` is reached (virtual time in paused tests)
pub async fn wait_for_stage(handle: &EngineHandle, stage: Stage) -> EngineSnapshot {
    for _ in 0..1000 {
        let snapshot = handle.snapshot().await.unwrap();
        if snapshot.stage == stage {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("stage {} not reached", stage);
}

/// Authenticate and wait until `ready`
pub async fn run_to_ready(handle: &EngineHandle) -> EngineSnapshot {
    handle.authenticate().await.unwrap();
    wait_for_stage(handle, Stage::Ready).await
}
