//! Audio output boundary
//!
//! The crossfade controller owns exactly one `AudioOutput`. The production
//! output renders nothing itself: it publishes source and gain changes as
//! events and the presentational client mirrors them on its media element.

use crate::error::Result;
use crate::state::SharedState;
use reel_common::{time, ReelEvent};
use std::sync::Arc;
use tracing::debug;

/// Single playback output driven by the crossfade controller
///
/// Calls arrive under the controller's lock and must not block.
pub trait AudioOutput: Send + 'static {
    /// Select the source to play next (replaces any current source)
    fn load(&mut self, source: &str);

    /// Begin playback of the loaded source
    ///
    /// May fail (blocked autoplay, unreadable media); the controller
    /// recovers by staying silent.
    fn play(&mut self) -> Result<()>;

    /// Stop playback
    fn pause(&mut self);

    /// Set gain, 0.0-1.0
    fn set_volume(&mut self, gain: f32);
}

/// Output that mirrors playback to event subscribers
pub struct EventOutput {
    shared: Arc<SharedState>,
    source: Option<String>,
}

impl EventOutput {
    pub fn new(shared: Arc<SharedState>) -> Self {
        Self {
            shared,
            source: None,
        }
    }
}

impl AudioOutput for EventOutput {
    fn load(&mut self, source: &str) {
        self.source = Some(source.to_string());
    }

    fn play(&mut self) -> Result<()> {
        debug!(source = ?self.source, "Output playing");
        self.shared.broadcast_event(ReelEvent::AudioSource {
            source: self.source.clone(),
            timestamp: time::now(),
        });
        Ok(())
    }

    fn pause(&mut self) {
        debug!(source = ?self.source, "Output paused");
        self.source = None;
        self.shared.broadcast_event(ReelEvent::AudioSource {
            source: None,
            timestamp: time::now(),
        });
    }

    fn set_volume(&mut self, gain: f32) {
        let gain = gain.clamp(0.0, 1.0);
        self.shared.broadcast_event(ReelEvent::AudioGain {
            gain,
            timestamp: time::now(),
        });
    }
}
