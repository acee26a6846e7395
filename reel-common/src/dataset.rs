//! Message dataset model and dashboard queries
//!
//! The dataset is a static, already-parsed JSON document. Stages treat it as
//! opaque beyond "present or not"; the dashboard reads it through the pure
//! filter functions here. Nothing in this module mutates a `Dataset`.

use chrono::{Datelike, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::time::parse_message_date;

/// Hook candidates must be longer than this many characters
const HOOK_MIN_CHARS: usize = 50;

/// Complete dataset document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub meta: Meta,
    #[serde(default)]
    pub wrapped: Wrapped,
    #[serde(default)]
    pub search_index: Vec<Message>,
}

/// Dataset metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    pub total_messages: u64,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Curated highlight collections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wrapped {
    #[serde(default)]
    pub sweetest: Vec<Message>,
    #[serde(default)]
    pub funniest: Vec<Message>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

/// Messages per month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub month_year: String,
    pub count: u64,
}

impl Dataset {
    /// Parse a dataset from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Case-insensitive substring search over the search index
    ///
    /// Queries shorter than `min_chars` (after trimming) return nothing.
    /// At most `limit` results, in index order.
    pub fn search(&self, query: &str, min_chars: usize, limit: usize) -> Vec<&Message> {
        let needle = query.trim().to_lowercase();
        if needle.chars().count() < min_chars {
            return Vec::new();
        }

        self.search_index
            .iter()
            .filter(|m| !m.message.is_empty() && m.message.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }

    /// Messages sent on the same month and day as `date`, any year
    pub fn on_this_day(&self, date: NaiveDate) -> Vec<&Message> {
        self.search_index
            .iter()
            .filter(|m| {
                parse_message_date(&m.timestamp)
                    .map(|d| d.month() == date.month() && d.day() == date.day())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Sweetest followed by funniest
    pub fn quotes(&self) -> Vec<&Message> {
        self.wrapped
            .sweetest
            .iter()
            .chain(self.wrapped.funniest.iter())
            .collect()
    }

    /// Messages eligible for the hook card
    ///
    /// Long sweet messages are preferred; when there are none, every sweet
    /// message qualifies.
    pub fn hook_candidates(&self) -> Vec<&Message> {
        let long: Vec<&Message> = self
            .wrapped
            .sweetest
            .iter()
            .filter(|m| m.message.chars().count() > HOOK_MIN_CHARS)
            .collect();

        if long.is_empty() {
            self.wrapped.sweetest.iter().collect()
        } else {
            long
        }
    }

    /// Pick one hook message at random
    pub fn pick_hook_message<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Message> {
        self.hook_candidates().choose(rng).copied()
    }
}

/// Gallery image references: `{dir}/{i}.{ext}` for i in 1..=count
pub fn gallery_refs(dir: &str, count: usize, extension: &str) -> Vec<String> {
    let dir = dir.trim_end_matches('/');
    (1..=count)
        .map(|i| format!("{}/{}.{}", dir, i, extension))
        .collect()
}
