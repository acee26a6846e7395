//! Crossfade audio controller
//!
//! Owns the single `AudioOutput` plus `current_source` / `current_gain`.
//! `retarget` performs ramp-down, swap, ramp-up on a spawned ramp task.
//!
//! # Cancellation
//!
//! Every ramp gets a fresh `CancellationToken`. `retarget` cancels the
//! previous token while holding the state lock, and a ramp checks its token
//! under that same lock before each mutation, so a superseded ramp can never
//! touch the output after its successor was requested. The newest request
//! always wins.

use crate::audio::output::AudioOutput;
use crate::state::SharedState;
use reel_common::{time, RampCurve, ReelEvent};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ramp parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RampSettings {
    /// Interval between fade-out steps
    pub fade_out_interval: Duration,

    /// Gain removed per fade-out step
    pub fade_out_step: f32,

    /// Fade-in steps spread evenly over the requested fade duration
    pub fade_in_steps: u32,

    /// Gain a fade-in ends at (never exceeded)
    pub gain_ceiling: f32,

    /// Fade-in shape
    pub fade_in_curve: RampCurve,
}

impl Default for RampSettings {
    fn default() -> Self {
        Self {
            fade_out_interval: Duration::from_millis(50),
            fade_out_step: 0.05,
            fade_in_steps: 20,
            gain_ceiling: 0.9,
            fade_in_curve: RampCurve::Linear,
        }
    }
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub current_source: Option<String>,
    pub current_gain: f32,
    /// Most recently requested target (None = silence)
    pub target: Option<String>,
    /// Ramps that ran to completion
    pub completed_ramps: u64,
}

struct ControllerState {
    output: Box<dyn AudioOutput>,
    current_source: Option<String>,
    current_gain: f32,
    target: Option<String>,
    completed_ramps: u64,
}

impl ControllerState {
    fn set_gain(&mut self, gain: f32) {
        self.current_gain = gain;
        self.output.set_volume(gain);
    }
}

type StateRef = Arc<Mutex<ControllerState>>;

fn lock(state: &StateRef) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Gain ramp scheduler over one audio output
pub struct CrossfadeController {
    state: StateRef,
    settings: RampSettings,
    shared: Arc<SharedState>,
    cancel: CancellationToken,
    ramp: Option<JoinHandle<()>>,
}

impl CrossfadeController {
    pub fn new(
        output: Box<dyn AudioOutput>,
        settings: RampSettings,
        shared: Arc<SharedState>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControllerState {
                output,
                current_source: None,
                current_gain: 0.0,
                target: None,
                completed_ramps: 0,
            })),
            settings,
            shared,
            cancel: CancellationToken::new(),
            ramp: None,
        }
    }

    /// Move audio to `target` (None or empty = silence)
    ///
    /// No-op when `target` equals the most recent request. Otherwise any
    /// in-flight ramp is cancelled and a new one starts. Returns whether a
    /// ramp was started. Must be called inside a tokio runtime.
    pub fn retarget(&mut self, target: Option<&str>, fade: Duration) -> bool {
        let target = target.filter(|t| !t.trim().is_empty()).map(str::to_string);

        let token = {
            let mut state = lock(&self.state);
            if state.target == target {
                return false;
            }

            self.cancel.cancel();
            self.cancel = CancellationToken::new();
            state.target = target.clone();
            self.cancel.clone()
        };

        info!(target = ?target, fade_ms = fade.as_millis() as u64, "Audio retarget");

        let ramp = Ramp {
            state: Arc::clone(&self.state),
            settings: self.settings.clone(),
            shared: Arc::clone(&self.shared),
            token,
            target,
            fade,
        };
        self.ramp = Some(tokio::spawn(ramp.run()));
        true
    }

    /// True while a ramp task is running
    pub fn is_ramping(&self) -> bool {
        self.ramp.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = lock(&self.state);
        ControllerSnapshot {
            current_source: state.current_source.clone(),
            current_gain: state.current_gain,
            target: state.target.clone(),
            completed_ramps: state.completed_ramps,
        }
    }
}

impl Drop for CrossfadeController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One ramp-down / swap / ramp-up cycle
struct Ramp {
    state: StateRef,
    settings: RampSettings,
    shared: Arc<SharedState>,
    token: CancellationToken,
    target: Option<String>,
    fade: Duration,
}

impl Ramp {
    /// Sleep unless cancelled first; false means the ramp is superseded
    async fn wait(&self, period: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(period) => true,
        }
    }

    /// Lock state, or None if superseded
    fn guard(&self) -> Option<MutexGuard<'_, ControllerState>> {
        let state = lock(&self.state);
        if self.token.is_cancelled() {
            None
        } else {
            Some(state)
        }
    }

    async fn run(self) {
        if !self.fade_out().await {
            debug!(target = ?self.target, "Ramp superseded during fade-out");
            return;
        }

        let Some(target) = self.target.clone() else {
            if let Some(mut state) = self.guard() {
                state.completed_ramps += 1;
                debug!("Faded to silence");
            }
            return;
        };

        if !self.start(&target) {
            return;
        }

        if !self.fade_in().await {
            debug!(target = %target, "Ramp superseded during fade-in");
            return;
        }

        if let Some(mut state) = self.guard() {
            state.completed_ramps += 1;
            debug!(target = %target, gain = state.current_gain, "Ramp complete");
        }
    }

    /// Step gain down to 0, then stop the old source
    async fn fade_out(&self) -> bool {
        {
            let Some(state) = self.guard() else {
                return false;
            };
            if state.current_source.is_none() {
                return true;
            }
        }

        loop {
            {
                let Some(mut state) = self.guard() else {
                    return false;
                };
                if state.current_gain <= self.settings.fade_out_step {
                    state.set_gain(0.0);
                    state.output.pause();
                    state.current_source = None;
                    return true;
                }
                let next = state.current_gain - self.settings.fade_out_step;
                state.set_gain(next);
            }

            if !self.wait(self.settings.fade_out_interval).await {
                return false;
            }
        }
    }

    /// Swap in the target and begin playback at zero gain
    ///
    /// On failure the controller stays silent and forgets the target so the
    /// same source can be requested again.
    fn start(&self, target: &str) -> bool {
        let Some(mut state) = self.guard() else {
            return false;
        };

        state.set_gain(0.0);
        state.output.load(target);
        match state.output.play() {
            Ok(()) => {
                state.current_source = Some(target.to_string());
                true
            }
            Err(e) => {
                warn!(source = %target, error = %e, "Playback failed to start, staying silent");
                state.current_source = None;
                state.target = None;
                drop(state);
                self.shared.broadcast_event(ReelEvent::AudioPlaybackFailed {
                    source: target.to_string(),
                    reason: e.to_string(),
                    timestamp: time::now(),
                });
                false
            }
        }
    }

    /// Raise gain to the ceiling over the fade duration
    async fn fade_in(&self) -> bool {
        let steps = self.settings.fade_in_steps.max(1);
        let period = self.fade / steps;
        let ceiling = self.settings.gain_ceiling;

        for step in 1..=steps {
            if !self.wait(period).await {
                return false;
            }
            let Some(mut state) = self.guard() else {
                return false;
            };
            let progress = step as f32 / steps as f32;
            let gain = self
                .settings
                .fade_in_curve
                .gain_at(0.0, ceiling, progress)
                .min(ceiling);
            state.set_gain(gain);
        }
        true
    }
}
