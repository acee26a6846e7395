//! Event types for the reel event stream
//!
//! `ReelEvent` is what leaves the engine: the SSE stream serializes it as
//! JSON with a `type` tag, and the presentational client renders against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level phase of the orchestrated experience
///
/// Stages only move forward, in declaration order. `Slides` is re-entered
/// once per segment advance (the slide cursor changes, the stage does not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Password,
    Loading,
    Ready,
    Hook,
    Slides,
    Dashboard,
}

impl Stage {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Password => "password",
            Stage::Loading => "loading",
            Stage::Ready => "ready",
            Stage::Hook => "hook",
            Stage::Slides => "slides",
            Stage::Dashboard => "dashboard",
        }
    }

    /// Stages whose content is built from the dataset
    pub fn needs_dataset(&self) -> bool {
        matches!(self, Stage::Hook | Stage::Slides | Stage::Dashboard)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reel event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReelEvent {
    /// Stage or slide cursor changed
    StageChanged {
        stage: Stage,
        /// Slide cursor, only meaningful in `slides`
        slide_index: Option<usize>,
        /// Active segment id (`hook` shows the first segment)
        segment_id: Option<String>,
        /// Resolved background media reference
        background: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Aggregate preload progress (0-100)
    LoadProgress {
        percent: f64,
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A manifest entry finished downloading and has a local handle
    AssetResolved {
        source_ref: String,
        uri: String,
        timestamp: DateTime<Utc>,
    },

    /// A manifest entry failed; consumers keep using the remote reference
    AssetFailed {
        source_ref: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Every manifest entry has settled
    LoadingComplete {
        resolved: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Dataset fetched and parsed
    DatasetReady {
        total_messages: u64,
        timestamp: DateTime<Utc>,
    },

    /// Engine is holding position because content is missing
    Stalled {
        stage: Stage,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Desired audio changed (None = silence)
    AudioTargetChanged {
        source: Option<String>,
        fade_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Output switched source (None = stopped)
    AudioSource {
        source: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Output gain changed (0.0-1.0)
    AudioGain {
        gain: f32,
        timestamp: DateTime<Utc>,
    },

    /// Output could not start playback; controller is silent
    AudioPlaybackFailed {
        source: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// One-shot celebratory cue on start
    Celebrate {
        timestamp: DateTime<Utc>,
    },
}

impl ReelEvent {
    /// Event type string (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            ReelEvent::StageChanged { .. } => "StageChanged",
            ReelEvent::LoadProgress { .. } => "LoadProgress",
            ReelEvent::AssetResolved { .. } => "AssetResolved",
            ReelEvent::AssetFailed { .. } => "AssetFailed",
            ReelEvent::LoadingComplete { .. } => "LoadingComplete",
            ReelEvent::DatasetReady { .. } => "DatasetReady",
            ReelEvent::Stalled { .. } => "Stalled",
            ReelEvent::AudioTargetChanged { .. } => "AudioTargetChanged",
            ReelEvent::AudioSource { .. } => "AudioSource",
            ReelEvent::AudioGain { .. } => "AudioGain",
            ReelEvent::AudioPlaybackFailed { .. } => "AudioPlaybackFailed",
            ReelEvent::Celebrate { .. } => "Celebrate",
        }
    }
}
