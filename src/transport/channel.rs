use std::io;
use std::time::Duration;

use anyhow::Result;

/// A serial device as reported by enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortInfo {
    /// OS device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub device: String,
    /// Human-readable description (USB product/manufacturer where known).
    pub description: String,
}

/// An open, line-oriented serial channel.
///
/// Not thread-safe by contract: one owner sends and reads at a time.
pub trait SerialChannel: Send {
    /// Write the whole buffer and flush it.
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read bytes up to and including the next `\n`, or until the channel
    /// timeout elapses. Returns whatever arrived (possibly empty).
    fn read_line(&mut self) -> io::Result<String>;

    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    fn is_open(&self) -> bool;

    fn close(&mut self);
}

/// Enumerates and opens serial channels.
pub trait SerialConnector: Send {
    fn available_ports(&self) -> Result<Vec<PortInfo>>;

    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialChannel>>;
}
