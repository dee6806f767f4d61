//! In-memory serial device.
//!
//! Records every frame written and replays queued response lines. Used for
//! dry runs (no arm attached) and by tests that need to count opens or inject
//! write failures.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::channel::{PortInfo, SerialChannel, SerialConnector};

#[derive(Debug, Default)]
pub struct MemoryDevice {
    pub ports: Vec<PortInfo>,
    /// Number of successful opens.
    pub opens: usize,
    /// Ports passed to each open attempt, in order.
    pub open_attempts: Vec<String>,
    /// Frames written, decoded as UTF-8.
    pub written: Vec<String>,
    /// Lines handed out by `read_line`, front first.
    pub responses: VecDeque<String>,
    /// Fail this many upcoming writes.
    pub failing_writes: usize,
    /// Fail every open while set.
    pub refuse_open: bool,
    /// Refuse opens while another channel is still live, like a tty held
    /// under an exclusive lock.
    pub exclusive: bool,
    /// Channels opened and not yet closed or dropped.
    pub live_channels: usize,
    /// Every timeout applied through `set_timeout`, in order.
    pub timeout_changes: Vec<Duration>,
}

/// Cloneable handle to a shared `MemoryDevice`.
#[derive(Clone, Debug, Default)]
pub struct MemoryConnector {
    device: Arc<Mutex<MemoryDevice>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that advertises the given ports during discovery.
    pub fn with_ports(ports: Vec<PortInfo>) -> Self {
        let connector = Self::new();
        connector.device().ports = ports;
        connector
    }

    /// Lock the shared device for inspection or fault injection.
    pub fn device(&self) -> MutexGuard<'_, MemoryDevice> {
        lock(&self.device)
    }

    pub fn written(&self) -> Vec<String> {
        self.device().written.clone()
    }
}

fn lock(device: &Mutex<MemoryDevice>) -> MutexGuard<'_, MemoryDevice> {
    device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SerialConnector for MemoryConnector {
    fn available_ports(&self) -> Result<Vec<PortInfo>> {
        Ok(self.device().ports.clone())
    }

    fn open(&self, port: &str, _baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialChannel>> {
        let mut device = self.device();
        device.open_attempts.push(port.to_string());
        if device.refuse_open {
            return Err(anyhow!("could not open port {}: device refused", port));
        }
        if device.exclusive && device.live_channels > 0 {
            return Err(anyhow!("could not open port {}: device busy", port));
        }
        device.opens += 1;
        device.live_channels += 1;
        Ok(Box::new(MemoryChannel {
            device: self.device.clone(),
            timeout,
            open: true,
        }))
    }
}

struct MemoryChannel {
    device: Arc<Mutex<MemoryDevice>>,
    timeout: Duration,
    open: bool,
}

impl SerialChannel for MemoryChannel {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut device = lock(&self.device);
        if device.failing_writes > 0 {
            device.failing_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        device
            .written
            .push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        Ok(lock(&self.device).responses.pop_front().unwrap_or_default())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        lock(&self.device).timeout_changes.push(timeout);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let mut device = lock(&self.device);
            device.live_channels = device.live_channels.saturating_sub(1);
        }
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}
