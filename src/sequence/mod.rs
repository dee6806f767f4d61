//! Motion sequences and their single-flight executor.

mod harvest;
mod plan;
mod runner;

pub use harvest::{harvest_sequence, HarvestSettings, HARVEST_SEQUENCE};
pub use plan::{MotionSequence, MotionStep};
pub use runner::{
    ActuatorSink, SequenceHandle, SequenceReport, Sequencer, SequencerError, Sleeper,
};
