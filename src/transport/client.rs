use std::ops::{Deref, DerefMut};
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::channel::{PortInfo, SerialChannel, SerialConnector};
use super::command::Command;
use super::serial::SerialPortConnector;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
/// Boards that reset when the port opens need this long before they listen.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// USB-serial bridge chips commonly found on ESP32 boards.
pub const BRIDGE_IDENTIFIERS: [&str; 6] = ["CP210", "CH340", "CH341", "FTDI", "USB Serial", "SLAB"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportSettings {
    /// Explicit device path. `None` means discover on connect.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// First port whose description names a known bridge chip (case-insensitive).
pub fn match_bridge_port(ports: &[PortInfo]) -> Option<&PortInfo> {
    ports.iter().find(|port| {
        let description = port.description.to_uppercase();
        BRIDGE_IDENTIFIERS
            .iter()
            .any(|id| description.contains(&id.to_uppercase()))
    })
}

/// Check an operator-supplied device path. Empty paths and paths with
/// whitespace or NUL are rejected.
pub fn validate_port(port: &str) -> Result<String> {
    let port = port.trim();
    if port.is_empty() || port.contains('\0') || port.contains(char::is_whitespace) {
        return Err(anyhow!("invalid serial port '{}'", port));
    }
    Ok(port.to_string())
}

/// Connection state. Created closed; only `Transport` mutates it.
struct Connection {
    port: Option<String>,
    baud_rate: u32,
    timeout: Duration,
    channel: Option<Box<dyn SerialChannel>>,
    connected: bool,
}

impl Connection {
    fn is_live(&self) -> bool {
        self.connected && self.channel.as_ref().is_some_and(|c| c.is_open())
    }
}

/// Line-oriented serial link to the actuator board.
///
/// Every operation reports failure through its return value and the log;
/// none of them returns an error or panics on I/O trouble. A failed write
/// marks the link closed so the next send reconnects.
pub struct Transport {
    connection: Connection,
    settle_delay: Duration,
    connector: Box<dyn SerialConnector>,
}

impl Transport {
    pub fn new(settings: TransportSettings, connector: Box<dyn SerialConnector>) -> Self {
        Self {
            connection: Connection {
                port: settings.port,
                baud_rate: settings.baud_rate,
                timeout: settings.timeout,
                channel: None,
                connected: false,
            },
            settle_delay: settings.settle_delay,
            connector,
        }
    }

    /// Transport over real serial hardware.
    pub fn serial(settings: TransportSettings) -> Self {
        Self::new(settings, Box::new(SerialPortConnector))
    }

    /// Resolved (or explicitly configured) device path.
    pub fn port(&self) -> Option<&str> {
        self.connection.port.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_live()
    }

    /// Serial devices currently visible to the OS. Enumeration errors are
    /// logged and yield an empty list.
    pub fn available_ports(&self) -> Vec<PortInfo> {
        match self.connector.available_ports() {
            Ok(ports) => ports,
            Err(err) => {
                log::warn!("serial port enumeration failed: {:#}", err);
                Vec::new()
            }
        }
    }

    /// Find a port that looks like an ESP32 USB-serial bridge.
    pub fn discover_port(&self) -> Option<String> {
        let ports = self.available_ports();
        let found = match_bridge_port(&ports)?;
        log::info!(
            "found potential actuator board: {} - {}",
            found.device,
            found.description
        );
        Some(found.device.clone())
    }

    /// Open the link. Idempotent while the channel stays open.
    pub fn connect(&mut self) -> bool {
        if self.connection.is_live() {
            return true;
        }
        // Close any handle left by a failed write or read before reopening.
        self.release_channel();

        if self.connection.port.is_none() {
            self.connection.port = self.discover_port();
        }
        let Some(port) = self.connection.port.clone() else {
            log::error!("could not find the actuator board; specify the serial port explicitly");
            return false;
        };

        log::info!(
            "connecting to {} at {} baud",
            port,
            self.connection.baud_rate
        );
        match self
            .connector
            .open(&port, self.connection.baud_rate, self.connection.timeout)
        {
            Ok(channel) => {
                self.connection.channel = Some(channel);
                if !self.settle_delay.is_zero() {
                    std::thread::sleep(self.settle_delay);
                }
                self.connection.connected = true;
                log::info!("connected to {}", port);
                true
            }
            Err(err) => {
                log::error!("error connecting to {}: {:#}", port, err);
                let ports = self.available_ports();
                if ports.is_empty() {
                    log::info!("no serial ports available");
                }
                for p in ports {
                    log::info!("available port: {} - {}", p.device, p.description);
                }
                false
            }
        }
    }

    /// Close the channel if open. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(mut channel) = self.connection.channel.take() {
            if channel.is_open() {
                channel.close();
                log::info!("disconnected from {}", self.port().unwrap_or("serial port"));
            }
        }
        self.connection.connected = false;
    }

    /// Drop the channel without logging a disconnect.
    fn release_channel(&mut self) {
        if let Some(mut channel) = self.connection.channel.take() {
            channel.close();
        }
        self.connection.connected = false;
    }

    /// Send one command, connecting first if needed.
    pub fn send(&mut self, command: &Command) -> bool {
        if !self.is_connected() && !self.connect() {
            return false;
        }

        let line = match command.encode_line() {
            Ok(line) => line,
            Err(err) => {
                log::error!("error encoding command: {:#}", err);
                return false;
            }
        };
        let out_of_range = command.out_of_range();
        if !out_of_range.is_empty() {
            log::warn!("pulse widths outside nominal range: {:?}", out_of_range);
        }

        let Some(channel) = self.connection.channel.as_mut() else {
            self.connection.connected = false;
            return false;
        };
        match channel.write_frame(line.as_bytes()) {
            Ok(()) => true,
            Err(err) => {
                log::error!("error sending command: {}", err);
                self.release_channel();
                false
            }
        }
    }

    pub fn set_servos(&mut self, base: u16, shoulder: u16, elbow: u16, wrist: u16) -> bool {
        self.send(&Command::servos(base, shoulder, elbow, wrist))
    }

    /// Accepts 3 values (wrist defaults to 1500) or 4 values.
    pub fn set_servos_from_us_list(&mut self, us: &[u16]) -> bool {
        match Command::from_us_list(us) {
            Ok(command) => self.send(&command),
            Err(err) => {
                log::error!("{:#}", err);
                false
            }
        }
    }

    /// Read one trimmed response line within `timeout`. The channel's own
    /// timeout is restored afterwards.
    pub fn read_response(&mut self, timeout: Duration) -> Option<String> {
        if !self.is_connected() {
            return None;
        }
        let channel = self.connection.channel.as_mut()?;

        let previous = channel.timeout();
        if let Err(err) = channel.set_timeout(timeout) {
            log::warn!("error setting read timeout: {}", err);
            return None;
        }
        let result = channel.read_line();
        if let Err(err) = channel.set_timeout(previous) {
            log::warn!("error restoring read timeout: {}", err);
        }

        match result {
            Ok(line) => {
                let line = line.trim();
                (!line.is_empty()).then(|| line.to_string())
            }
            Err(err) => {
                log::error!("error reading response: {}", err);
                self.release_channel();
                None
            }
        }
    }

    /// Connect and hand back a guard that disconnects when dropped,
    /// including during unwinding.
    pub fn session(&mut self) -> Session<'_> {
        let connected = self.connect();
        Session {
            transport: self,
            connected,
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Scoped use of a `Transport`; disconnects on every exit path.
pub struct Session<'a> {
    transport: &'a mut Transport,
    connected: bool,
}

impl Session<'_> {
    /// Whether the connect attempt at session start succeeded.
    pub fn connected(&self) -> bool {
        self.connected
    }
}

impl Deref for Session<'_> {
    type Target = Transport;

    fn deref(&self) -> &Transport {
        self.transport
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Transport {
        self.transport
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.transport.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryConnector;

    fn settings(port: Option<&str>) -> TransportSettings {
        TransportSettings {
            port: port.map(str::to_string),
            settle_delay: Duration::ZERO,
            ..TransportSettings::default()
        }
    }

    fn ports() -> Vec<PortInfo> {
        vec![
            PortInfo {
                device: "/dev/ttyS0".into(),
                description: "n/a".into(),
            },
            PortInfo {
                device: "/dev/ttyUSB0".into(),
                description: "cp2102 usb to uart bridge controller".into(),
            },
            PortInfo {
                device: "/dev/ttyUSB1".into(),
                description: "FTDI FT232R".into(),
            },
        ]
    }

    #[test]
    fn discovery_matches_bridge_chips_case_insensitively() {
        let ports = ports();
        assert_eq!(match_bridge_port(&ports).unwrap().device, "/dev/ttyUSB0");
        assert!(match_bridge_port(&ports[..1]).is_none());
    }

    #[test]
    fn validates_operator_ports() {
        assert_eq!(validate_port(" /dev/ttyUSB0 ").unwrap(), "/dev/ttyUSB0");
        assert_eq!(validate_port("COM3").unwrap(), "COM3");
        assert!(validate_port("").is_err());
        assert!(validate_port("   ").is_err());
        assert!(validate_port("/dev/tty USB0").is_err());
        assert!(validate_port("/dev/tty\0USB0").is_err());
    }

    #[test]
    fn connect_is_idempotent() {
        let connector = MemoryConnector::new();
        let mut transport = Transport::new(settings(Some("/dev/ttyACM0")), Box::new(connector.clone()));
        assert!(transport.connect());
        assert!(transport.connect());
        assert_eq!(connector.device().opens, 1);
    }

    #[test]
    fn connect_discovers_port_when_unset() {
        let connector = MemoryConnector::with_ports(ports());
        let mut transport = Transport::new(settings(None), Box::new(connector.clone()));
        assert!(transport.connect());
        assert_eq!(transport.port(), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn connect_without_port_or_match_fails_softly() {
        let connector = MemoryConnector::with_ports(ports()[..1].to_vec());
        let mut transport = Transport::new(settings(None), Box::new(connector.clone()));
        assert!(!transport.connect());
        assert!(connector.device().open_attempts.is_empty());
    }

    #[test]
    fn open_failure_returns_false() {
        let connector = MemoryConnector::new();
        connector.device().refuse_open = true;
        let mut transport = Transport::new(settings(Some("COM3")), Box::new(connector.clone()));
        assert!(!transport.connect());
        assert!(!transport.is_connected());
    }

    #[test]
    fn send_connects_on_demand_and_reconnects_after_failure() {
        let connector = MemoryConnector::new();
        let mut transport = Transport::new(settings(Some("COM3")), Box::new(connector.clone()));

        assert!(transport.set_servos_from_us_list(&[1500, 1600, 1800]));
        assert_eq!(connector.device().opens, 1);

        connector.device().failing_writes = 1;
        assert!(!transport.set_servos(1500, 1500, 1500, 1500));
        assert!(!transport.is_connected());

        assert!(transport.send(&Command::Ping));
        assert_eq!(connector.device().opens, 2);
        assert_eq!(
            connector.written(),
            vec![
                "{\"op\":\"servos\",\"base\":1500,\"shoulder\":1600,\"elbow\":1800,\"wrist\":1500}\n"
                    .to_string(),
                "{\"op\":\"ping\"}\n".to_string(),
            ]
        );
    }

    #[test]
    fn reconnects_on_exclusive_port_after_write_failure() {
        let connector = MemoryConnector::new();
        connector.device().exclusive = true;
        let mut transport = Transport::new(settings(Some("/dev/ttyUSB0")), Box::new(connector.clone()));

        assert!(transport.send(&Command::Ping));
        connector.device().failing_writes = 1;
        assert!(!transport.send(&Command::Ping));
        assert_eq!(connector.device().live_channels, 0);

        assert!(transport.send(&Command::Ping));
        assert_eq!(connector.device().opens, 2);
        assert_eq!(connector.device().live_channels, 1);
        assert_eq!(connector.written().len(), 2);
    }

    #[test]
    fn bad_arity_sends_nothing() {
        let connector = MemoryConnector::new();
        let mut transport = Transport::new(settings(Some("COM3")), Box::new(connector.clone()));
        assert!(!transport.set_servos_from_us_list(&[1500, 1500]));
        assert_eq!(connector.device().opens, 0);
    }

    #[test]
    fn read_response_trims_and_handles_silence() {
        let connector = MemoryConnector::new();
        let mut transport = Transport::new(settings(Some("COM3")), Box::new(connector.clone()));
        assert_eq!(transport.read_response(DEFAULT_READ_TIMEOUT), None);

        assert!(transport.connect());
        connector.device().responses.push_back("  ok servos\r\n".into());
        connector.device().responses.push_back("   \n".into());
        assert_eq!(transport.read_response(DEFAULT_READ_TIMEOUT).as_deref(), Some("ok servos"));
        assert_eq!(transport.read_response(DEFAULT_READ_TIMEOUT), None);
        assert_eq!(transport.read_response(DEFAULT_READ_TIMEOUT), None);
    }

    #[test]
    fn read_response_restores_channel_timeout() {
        let connector = MemoryConnector::new();
        let mut transport = Transport::new(settings(Some("COM3")), Box::new(connector.clone()));
        assert!(transport.connect());

        connector.device().responses.push_back("ok\n".into());
        assert_eq!(transport.read_response(Duration::from_millis(50)).as_deref(), Some("ok"));
        assert_eq!(
            connector.device().timeout_changes,
            vec![Duration::from_millis(50), DEFAULT_TIMEOUT]
        );
    }

    #[test]
    fn disconnect_is_safe_when_closed() {
        let connector = MemoryConnector::new();
        let mut transport = Transport::new(settings(Some("COM3")), Box::new(connector));
        transport.disconnect();
        assert!(transport.connect());
        transport.disconnect();
        transport.disconnect();
        assert!(!transport.is_connected());
    }

    #[test]
    fn session_disconnects_on_early_exit_and_panic() {
        let connector = MemoryConnector::new();
        let mut transport = Transport::new(settings(Some("COM3")), Box::new(connector.clone()));

        fn early_return(transport: &mut Transport) -> Option<()> {
            let mut session = transport.session();
            assert!(session.connected());
            session.send(&Command::Ping);
            let nothing: Option<()> = None;
            nothing?;
            Some(())
        }
        assert!(early_return(&mut transport).is_none());
        assert!(!transport.is_connected());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let session = transport.session();
            assert!(session.is_connected());
            panic!("failure inside session");
        }));
        assert!(result.is_err());
        assert!(!transport.is_connected());
        assert_eq!(connector.device().opens, 2);
    }
}
