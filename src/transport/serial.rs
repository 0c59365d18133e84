//! Serial/USB transport implementation.
//!
//! This module provides blocking serial port access through the
//! `serialport` API re-exported by `tokio-serial`.

use std::io::{self, Read, Write};
use std::time::Duration;

use tokio_serial::{ClearBuffer, DataBits, ErrorKind, FlowControl, SerialPort, StopBits};

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::transport::config::{Parity, SerialConfig};

/// Timeout applied to the port until the first read sets its own.
pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_millis(50);

/// Serial transport for Open BSC communication.
#[derive(Default)]
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
}

impl SerialTransport {
    /// Creates a new, closed serial transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the name of the port last opened.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port not open"))
    }
}

fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    if bits == 2 { StopBits::Two } else { StopBits::One }
}

fn parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

fn open_error(port: &str, err: &tokio_serial::Error) -> Error {
    match err.kind {
        ErrorKind::NoDevice | ErrorKind::Io(io::ErrorKind::NotFound) => Error::PortNotFound {
            port: port.to_string(),
        },
        _ => Error::PortUnavailable {
            port: port.to_string(),
            reason: err.description.clone(),
        },
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, config: &SerialConfig) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        tracing::info!("opening serial port: {}", config);

        let mut port = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(data_bits(config.data_bits))
            .stop_bits(stop_bits(config.stop_bits))
            .parity(parity(config.parity))
            .flow_control(FlowControl::None)
            .timeout(DEFAULT_PORT_TIMEOUT)
            .open()
            .map_err(|e| open_error(&config.port, &e))?;

        if let Err(e) = port.write_request_to_send(config.rts) {
            tracing::warn!("failed to set RTS: {}", e);
        }
        if let Err(e) = port.write_data_terminal_ready(config.dtr) {
            tracing::warn!("failed to set DTR: {}", e);
        }

        self.name.clone_from(&config.port);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!("closed serial port: {}", self.name);
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.port_mut()?.write(data)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let port = self.port_mut()?;
        port.set_timeout(timeout)?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port_mut()?.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
