//! Audio output boundary and crossfade scheduling

pub mod crossfade;
pub mod output;

pub use crossfade::{ControllerSnapshot, CrossfadeController, RampSettings};
pub use output::{AudioOutput, EventOutput};
