//! # Reel Player Library (reel-player)
//!
//! Playback orchestration engine for a scripted audiovisual show.
//!
//! **Purpose:** Gate entry behind a passphrase, preload the media manifest
//! with aggregate progress, walk the stage sequence with timed and
//! user-driven transitions, and crossfade the soundtrack between segments.
//!
//! **Architecture:** One tokio task owns the stage machine; the asset
//! loader, stage timers and audio ramps run as cancellable tasks that report
//! back over channels. An axum server exposes triggers, state and an SSE
//! event stream.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod gate;
pub mod loader;
pub mod playback;
pub mod state;

pub use config::ShowConfig;
pub use error::{Error, Result};
pub use playback::{EngineHandle, EngineSnapshot, ShowEngine};
pub use state::SharedState;
