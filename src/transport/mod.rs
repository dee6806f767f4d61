//! Serial link to the actuator board.
//!
//! Commands go out as newline-terminated JSON objects, one per line. The
//! link is discovered by USB bridge description when no port is given,
//! opened on demand, and dropped on any write failure so the next command
//! reconnects.

mod channel;
mod client;
mod command;
mod memory;
mod serial;

pub use channel::{PortInfo, SerialChannel, SerialConnector};
pub use client::{
    match_bridge_port, validate_port, Session, Transport, TransportSettings, BRIDGE_IDENTIFIERS,
    DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT, DEFAULT_SETTLE_DELAY, DEFAULT_TIMEOUT,
};
pub use command::{Command, DEFAULT_WRIST_US, NOMINAL_MAX_US, NOMINAL_MIN_US};
pub use memory::{MemoryConnector, MemoryDevice};
pub use serial::SerialPortConnector;
