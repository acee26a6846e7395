//! Show configuration for reel-player
//!
//! Two tiers:
//! 1. **Command line / environment**: show file path, port, base URL, log level
//! 2. **TOML show file**: manifest, segments, fade timings, progress policy
//!
//! Every key has a built-in default reproducing the stock show, so a missing
//! show file is a warning, not a failure. A show file that exists but does
//! not parse or validate stops startup.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --base-url, --log-level)
//! 2. Environment variables (clap `env`)
//! 3. TOML show file
//! 4. Built-in defaults (code constants)

use crate::audio::crossfade::RampSettings;
use crate::error::{Error, Result};
use crate::loader::progress::ProgressPolicy;
use crate::playback::sequencer::Segment;
use reel_common::RampCurve;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Complete show configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    /// HTTP server port
    pub port: u16,

    /// Base URL that relative media and dataset references resolve against
    pub base_url: String,

    /// Dataset reference (fetched when loading starts)
    pub dataset: String,

    /// Passphrase gating entry (compared case-insensitively)
    pub passphrase: String,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Stage and fade timings
    pub timing: TimingConfig,

    /// Preload progress aggregation
    pub progress: ProgressConfig,

    /// Media preloaded during `loading`
    pub manifest: Vec<String>,

    /// Ordered narrative segments
    pub segments: Vec<Segment>,

    /// Dashboard behaviour
    pub dashboard: DashboardConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,
}

/// Stage and fade timings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause between loading complete and entering `ready`
    pub settle_delay_ms: u64,

    /// Auto-advance from `hook` to `slides`
    pub hook_duration_ms: u64,

    /// Fade-in used when the narrative starts (entering `hook`)
    pub intro_fade_ms: u64,

    /// Fade-in used on every later segment change
    pub segment_fade_ms: u64,

    /// Interval between fade-out steps
    pub fade_out_step_ms: u64,

    /// Gain removed per fade-out step
    pub fade_out_step: f32,

    /// Number of fade-in steps across the fade duration
    pub fade_in_steps: u32,

    /// Gain a fade-in stops at
    pub gain_ceiling: f32,

    /// Fade-in shape
    pub fade_in_curve: RampCurve,
}

/// Preload progress aggregation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub policy: ProgressPolicy,
}

/// Dashboard behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Keep the last narrative track playing under the dashboard
    pub keep_audio: bool,

    /// Gallery image directory reference
    pub gallery_dir: String,

    /// Number of gallery images
    pub gallery_count: usize,

    /// Gallery image extension
    pub gallery_extension: String,

    /// Maximum search results
    pub search_limit: usize,

    /// Minimum query length before searching
    pub search_min_chars: usize,
}

/// Command-line overrides applied on top of the show file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub log_level: Option<String>,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            port: 5780,
            base_url: "http://127.0.0.1:3000".to_string(),
            dataset: "/data.json".to_string(),
            passphrase: "loveyouidiot".to_string(),
            logging: LoggingConfig::default(),
            timing: TimingConfig::default(),
            progress: ProgressConfig::default(),
            manifest: vec!["/bg-video.mp4".to_string(), "/music-intro.mp3".to_string()],
            segments: vec![
                Segment::new("intro", "/bg-video.mp4", Some("/music-intro.mp3")),
                Segment::new("stats", "/bg-stats.mp4", Some("/music-stats.mp3")),
                Segment::new("love", "/bg-love.mp4", Some("/music-love.mp3")),
            ],
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            hook_duration_ms: 6000,
            intro_fade_ms: 5000,
            segment_fade_ms: 1000,
            fade_out_step_ms: 50,
            fade_out_step: 0.05,
            fade_in_steps: 20,
            gain_ceiling: 0.9,
            fade_in_curve: RampCurve::Linear,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            keep_audio: true,
            gallery_dir: "/memories".to_string(),
            gallery_count: 20,
            gallery_extension: "jpeg".to_string(),
            search_limit: 50,
            search_min_chars: 2,
        }
    }
}

impl TimingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn hook_duration(&self) -> Duration {
        Duration::from_millis(self.hook_duration_ms)
    }

    pub fn intro_fade(&self) -> Duration {
        Duration::from_millis(self.intro_fade_ms)
    }

    pub fn segment_fade(&self) -> Duration {
        Duration::from_millis(self.segment_fade_ms)
    }

    /// Ramp parameters for the crossfade controller
    pub fn ramp_settings(&self) -> RampSettings {
        RampSettings {
            fade_out_interval: Duration::from_millis(self.fade_out_step_ms),
            fade_out_step: self.fade_out_step,
            fade_in_steps: self.fade_in_steps,
            gain_ceiling: self.gain_ceiling,
            fade_in_curve: self.fade_in_curve,
        }
    }
}

impl ShowConfig {
    /// Load the show file, falling back to defaults when it does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration fails validation.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let config: ShowConfig = reel_common::config::load_toml(path)?;
                info!(path = %path.display(), "Loaded show file");
                config
            }
            Some(path) => {
                warn!(path = %path.display(), "Show file not found, using built-in defaults");
                ShowConfig::default()
            }
            None => {
                warn!("No show file found, using built-in defaults");
                ShowConfig::default()
            }
        };

        config.apply_overrides(overrides);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Parse a show file from TOML text (no overrides)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: ShowConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse show file: {}", e)))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Blank audio references mean "no managed audio"
    fn normalize(&mut self) {
        for segment in &mut self.segments {
            if segment.audio.as_deref().map(str::trim).is_some_and(str::is_empty) {
                segment.audio = None;
            }
        }
    }

    /// Check invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(Error::Config("At least one segment is required".to_string()));
        }

        let mut seen = HashSet::new();
        for segment in &self.segments {
            if segment.id.trim().is_empty() {
                return Err(Error::Config("Segment id must not be empty".to_string()));
            }
            if !seen.insert(segment.id.as_str()) {
                return Err(Error::Config(format!("Duplicate segment id '{}'", segment.id)));
            }
        }

        if self.passphrase.trim().is_empty() {
            return Err(Error::Config("Passphrase must not be empty".to_string()));
        }

        reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid base_url '{}': {}", self.base_url, e)))?;

        let timing = &self.timing;
        if !(timing.gain_ceiling > 0.0 && timing.gain_ceiling <= 1.0) {
            return Err(Error::Config(format!(
                "gain_ceiling must be in (0, 1], got {}",
                timing.gain_ceiling
            )));
        }
        if !(timing.fade_out_step > 0.0 && timing.fade_out_step <= 1.0) {
            return Err(Error::Config(format!(
                "fade_out_step must be in (0, 1], got {}",
                timing.fade_out_step
            )));
        }
        if timing.fade_in_steps == 0 {
            return Err(Error::Config("fade_in_steps must be at least 1".to_string()));
        }
        if timing.fade_out_step_ms == 0 {
            return Err(Error::Config("fade_out_step_ms must be at least 1".to_string()));
        }

        self.progress.policy.validate()?;
        Ok(())
    }
}
