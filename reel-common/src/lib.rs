//! # Reel Common Library
//!
//! Shared code for the reel playback engine and its consumers:
//! - Stage and event types (ReelEvent enum)
//! - Dataset model and read-only dashboard queries
//! - Gain ramp curve definitions
//! - Show file location and TOML loading
//! - Timestamp utilities

pub mod config;
pub mod dataset;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod time;

pub use dataset::Dataset;
pub use error::{Error, Result};
pub use events::{ReelEvent, Stage};
pub use fade_curves::RampCurve;
