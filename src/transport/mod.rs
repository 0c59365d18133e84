//! Transport layer for Open BSC communication.
//!
//! This module provides the byte-level abstraction a session rides on.
//! The serial backend is the only production implementation; the session
//! never branches on platform.

pub mod config;
#[cfg(test)]
pub(crate) mod mock;
pub mod serial;

use std::io;
use std::time::Duration;

use crate::error::Result;

/// Trait for transport implementations.
pub trait Transport: Send {
    /// Opens and configures the device named by `config`.
    fn open(&mut self, config: &config::SerialConfig) -> Result<()>;

    /// Closes the device. Closing a closed transport does nothing.
    fn close(&mut self);

    /// Writes `data` in a single call and returns how many bytes were taken.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Reads up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Discards any data pending in either direction.
    fn flush(&mut self) -> io::Result<()>;

    /// Returns true if the device is open.
    fn is_open(&self) -> bool;
}

pub use config::{Parity, SerialConfig};
pub use serial::SerialTransport;
