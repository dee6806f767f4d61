//! Camera-guided pick-and-place for a four-servo arm.
//!
//! # Architecture
//!
//! The crate is split along the runtime's concurrency boundaries:
//!
//! 1. **Detector** (`detect`): finds the target in a frame by color
//!    segmentation or a pretrained box detector loaded once per process.
//! 2. **Transport** (`transport`): newline-delimited JSON over a serial link,
//!    with port discovery and connect-on-demand.
//! 3. **Sequencer** (`sequence`): executes a motion sequence on a worker
//!    thread, never more than one at a time.
//! 4. **Input router** (`input`): merges a background key listener and a
//!    focus-scoped key source into one stream of commands.
//!
//! `control::ControlLoop` wires them together. The two worker threads (key
//! listener and sequence runner) share state with the loop only through the
//! input mailbox and the sequencer's running flag.

pub mod config;
pub mod control;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod input;
pub mod kinematics;
pub mod sequence;
pub mod transport;

pub use config::ArmConfig;
pub use control::{ControlLoop, ExitReason, LoopSettings, LoopSummary};
pub use detect::{Detection, Detector, LazyModel, Target};
pub use frame::Frame;
pub use sequence::{MotionSequence, MotionStep, Sequencer, SequencerError};
pub use transport::{Command, Transport, TransportSettings};
