//! `serialport`-backed channel and connector.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serialport::{SerialPort, SerialPortType};

use super::channel::{PortInfo, SerialChannel, SerialConnector};

/// Upper bound on one response line; longer input is returned truncated.
const MAX_LINE_BYTES: usize = 4096;

/// Connector for real serial devices.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialPortConnector;

impl SerialConnector for SerialPortConnector {
    fn available_ports(&self) -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().context("enumerate serial ports")?;
        Ok(ports
            .into_iter()
            .map(|port| PortInfo {
                description: describe(&port.port_type),
                device: port.port_name,
            })
            .collect())
    }

    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialChannel>> {
        let handle = serialport::new(port, baud_rate)
            .timeout(timeout)
            .open()
            .with_context(|| format!("open serial port {} at {} baud", port, baud_rate))?;
        Ok(Box::new(SerialPortChannel {
            port: Some(handle),
        }))
    }
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut parts = Vec::new();
            if let Some(product) = &usb.product {
                parts.push(product.clone());
            }
            if let Some(manufacturer) = &usb.manufacturer {
                parts.push(format!("({})", manufacturer));
            }
            parts.push(format!("[{:04x}:{:04x}]", usb.vid, usb.pid));
            parts.join(" ")
        }
        SerialPortType::PciPort => "PCI serial".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

struct SerialPortChannel {
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortChannel {
    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
    }
}

impl SerialChannel for SerialPortChannel {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        let port = self.port_mut()?;
        let deadline = Instant::now() + port.timeout();
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while line.len() < MAX_LINE_BYTES && Instant::now() <= deadline {
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::TimedOut => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    fn timeout(&self) -> Duration {
        self.port
            .as_ref()
            .map(|port| port.timeout())
            .unwrap_or_default()
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port_mut()?.set_timeout(timeout).map_err(io::Error::from)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        self.port = None;
    }
}
