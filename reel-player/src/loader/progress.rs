//! Preload progress aggregation
//!
//! Each manifest entry reports bytes received, and a total when the server
//! sends one. `LoadTracker` folds those reports into one 0-100 figure using a
//! swappable `ProgressPolicy`.
//!
//! Per-entry fraction:
//! - settled (success or failure): 1.0
//! - in flight, total known: received / total
//! - in flight, total unknown: 0.0 (contributes only on completion)
//!
//! The aggregate never decreases, stays below 100 while anything is in
//! flight, and is exactly 100 once every entry has settled.

use crate::error::{Error, Result};
use serde::Deserialize;

/// Highest figure reported while any entry is still in flight
const IN_FLIGHT_CAP: f64 = 99.0;

/// How entry fractions combine into the aggregate
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressPolicy {
    /// One named entry owns a fixed share of the bar regardless of byte
    /// totals; the rest is split evenly across the other entries.
    Dominant { source_ref: String, share: f64 },

    /// Σreceived / Σtotal when every entry reported a total, otherwise the
    /// even average of entry fractions.
    ByteWeighted,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        ProgressPolicy::Dominant {
            source_ref: "/bg-video.mp4".to_string(),
            share: 0.9,
        }
    }
}

impl ProgressPolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            ProgressPolicy::Dominant { source_ref, share } => {
                if source_ref.trim().is_empty() {
                    return Err(Error::Config(
                        "Dominant progress policy needs a source_ref".to_string(),
                    ));
                }
                if !(*share > 0.0 && *share <= 1.0) {
                    return Err(Error::Config(format!(
                        "Dominant share must be in (0, 1], got {}",
                        share
                    )));
                }
                Ok(())
            }
            ProgressPolicy::ByteWeighted => Ok(()),
        }
    }

    /// Aggregate fraction (0.0-1.0) for the given entries
    pub fn aggregate(&self, entries: &[EntryProgress]) -> f64 {
        if entries.is_empty() {
            return 1.0;
        }

        let value = match self {
            ProgressPolicy::Dominant { source_ref, share } => {
                match entries.iter().position(|e| &e.source_ref == source_ref) {
                    Some(idx) if entries.len() == 1 => entries[idx].fraction(),
                    Some(idx) => {
                        let others: Vec<&EntryProgress> = entries
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i != idx)
                            .map(|(_, e)| e)
                            .collect();
                        let rest = others.iter().map(|e| e.fraction()).sum::<f64>()
                            / others.len() as f64;
                        share * entries[idx].fraction() + (1.0 - share) * rest
                    }
                    None => even_average(entries),
                }
            }
            ProgressPolicy::ByteWeighted => {
                let totals: Option<Vec<u64>> = entries.iter().map(|e| e.total).collect();
                match totals {
                    Some(totals) if totals.iter().sum::<u64>() > 0 => {
                        let sum_total: u64 = totals.iter().sum();
                        let sum_received: u64 = entries
                            .iter()
                            .zip(&totals)
                            .map(|(e, total)| {
                                if e.is_settled() {
                                    *total
                                } else {
                                    e.received.min(*total)
                                }
                            })
                            .sum();
                        sum_received as f64 / sum_total as f64
                    }
                    _ => even_average(entries),
                }
            }
        };

        value.clamp(0.0, 1.0)
    }
}

fn even_average(entries: &[EntryProgress]) -> f64 {
    entries.iter().map(|e| e.fraction()).sum::<f64>() / entries.len() as f64
}

/// Lifecycle of one manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    InFlight,
    Succeeded,
    Failed,
}

/// Progress of one manifest entry
#[derive(Debug, Clone)]
pub struct EntryProgress {
    pub source_ref: String,
    pub received: u64,
    pub total: Option<u64>,
    pub state: EntryState,
}

impl EntryProgress {
    pub fn new(source_ref: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            received: 0,
            total: None,
            state: EntryState::InFlight,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state != EntryState::InFlight
    }

    /// Contribution of this entry, 0.0-1.0
    pub fn fraction(&self) -> f64 {
        if self.is_settled() {
            return 1.0;
        }
        match self.total {
            Some(total) if total > 0 => (self.received as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }
}

/// Aggregate progress over a fixed manifest
#[derive(Debug)]
pub struct LoadTracker {
    entries: Vec<EntryProgress>,
    policy: ProgressPolicy,
    completed: usize,
    reported: f64,
}

impl LoadTracker {
    pub fn new<S: AsRef<str>>(manifest: &[S], policy: ProgressPolicy) -> Self {
        Self {
            entries: manifest.iter().map(|r| EntryProgress::new(r.as_ref())).collect(),
            policy,
            completed: 0,
            reported: 0.0,
        }
    }

    /// Record bytes for an in-flight entry
    ///
    /// Returns the new aggregate when it moved. Reports for settled entries
    /// are ignored.
    pub fn record_progress(&mut self, index: usize, received: u64, total: Option<u64>) -> Option<f64> {
        let entry = self.entries.get_mut(index)?;
        if entry.is_settled() {
            return None;
        }
        entry.received = received;
        if total.is_some() {
            entry.total = total;
        }
        self.refresh()
    }

    /// Settle an entry as succeeded or failed
    ///
    /// Returns `false` if the entry was already settled; `completed` counts
    /// each entry exactly once.
    pub fn settle(&mut self, index: usize, succeeded: bool) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        if entry.is_settled() {
            return false;
        }
        entry.state = if succeeded {
            EntryState::Succeeded
        } else {
            EntryState::Failed
        };
        self.completed += 1;
        self.refresh();
        true
    }

    fn refresh(&mut self) -> Option<f64> {
        let next = if self.is_complete() {
            100.0
        } else {
            (self.policy.aggregate(&self.entries) * 100.0).min(IN_FLIGHT_CAP)
        };

        if next > self.reported {
            self.reported = next;
            Some(next)
        } else {
            None
        }
    }

    /// Current aggregate, 0-100
    pub fn percent(&self) -> f64 {
        if self.is_complete() {
            100.0
        } else {
            self.reported
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.entries.len()
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == EntryState::Failed)
            .count()
    }

    pub fn entries(&self) -> &[EntryProgress] {
        &self.entries
    }
}
