//! Stage machine, slide sequencer and the engine task that drives them

pub mod engine;
pub mod events;
pub mod sequencer;
pub mod stage_machine;

pub use engine::{EngineHandle, ShowEngine};
pub use events::{EngineSnapshot, Trigger};
pub use sequencer::{Segment, SlideSequencer};
pub use stage_machine::StageMachine;
