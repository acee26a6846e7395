//! Slide sequencer
//!
//! Read-only ordered view over the configured segments. The cursor belongs
//! to the stage machine and is passed in; nothing here holds a timer or
//! mutable position.

use serde::Deserialize;

/// One unit of the scripted sequence
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Segment {
    pub id: String,

    /// Background media reference
    pub background: String,

    /// Managed audio reference; None means no managed audio
    #[serde(default)]
    pub audio: Option<String>,
}

impl Segment {
    pub fn new(id: &str, background: &str, audio: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            background: background.to_string(),
            audio: audio.map(str::to_string),
        }
    }
}

/// Positional accessor over an immutable segment list
#[derive(Debug, Clone)]
pub struct SlideSequencer {
    segments: Vec<Segment>,
}

impl SlideSequencer {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Segment shown before the slides begin
    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn current(&self, cursor: usize) -> Option<&Segment> {
        self.segments.get(cursor)
    }

    pub fn has_next(&self, cursor: usize) -> bool {
        cursor + 1 < self.segments.len()
    }

    /// Cursor after `cursor`, or None at the last segment
    pub fn next(&self, cursor: usize) -> Option<usize> {
        self.has_next(cursor).then_some(cursor + 1)
    }
}
