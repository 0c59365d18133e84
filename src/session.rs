//! Request/response session over a single transport.
//!
//! A [`Session`] owns one transport exclusively and drives the
//! write-then-read exchange: encode a command, write the frame in one call,
//! then accumulate response bytes until a complete frame validates or the
//! deadline passes. Every call blocks the calling thread; callers sharing a
//! session across threads must serialize access themselves.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{Error, FrameError, Result};
use crate::protocol::{FrameDecoder, MAX_FRAME_SIZE, encode_frame};
use crate::transport::{SerialConfig, SerialTransport, Transport};

/// Default time to wait for a response frame.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default timeout of each individual transport read.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_millis(10);

/// Maximum bytes requested from the transport per read.
pub const READ_CHUNK_SIZE: usize = 64;

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No configuration stored.
    Unconfigured,
    /// Configuration accepted, device not opened yet.
    Configured,
    /// Device open and ready for exchanges.
    Open,
    /// Device closed; the configuration is kept for reopening.
    Closed,
}

/// A synchronous command session with one device.
pub struct Session<T> {
    transport: T,
    config: Option<SerialConfig>,
    state: SessionState,
    decoder: FrameDecoder,
    chunk_timeout: Duration,
}

impl Session<SerialTransport> {
    /// Creates a session backed by a serial port.
    #[must_use]
    pub fn serial() -> Self {
        Self::new(SerialTransport::new())
    }
}

impl<T: Transport> Session<T> {
    /// Creates an unconfigured session that owns `transport`.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: None,
            state: SessionState::Unconfigured,
            decoder: FrameDecoder::new(),
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true if the device is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Returns the stored configuration, if any.
    #[must_use]
    pub const fn config(&self) -> Option<&SerialConfig> {
        self.config.as_ref()
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Sets the timeout of each individual read inside [`Self::read_response`].
    ///
    /// Shorter values enforce the overall deadline more precisely. Zero is
    /// raised to one millisecond.
    pub fn set_chunk_timeout(&mut self, timeout: Duration) {
        self.chunk_timeout = timeout.max(Duration::from_millis(1));
    }

    /// Validates and stores `config` without opening the device.
    ///
    /// An open device is closed first.
    pub fn configure(&mut self, config: SerialConfig) -> Result<()> {
        self.disconnect();
        if let Err(e) = config.validate() {
            self.config = None;
            self.state = SessionState::Unconfigured;
            return Err(e);
        }

        tracing::debug!("session configured for {}", config);
        self.config = Some(config);
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Opens the device using the stored configuration.
    ///
    /// Opening an open session does nothing.
    pub fn open(&mut self) -> Result<()> {
        if self.state == SessionState::Open {
            return Ok(());
        }
        let config = self.config.as_ref().ok_or(Error::NotConfigured)?;

        self.transport.open(config)?;
        self.decoder.clear();
        self.state = SessionState::Open;
        tracing::info!("connected to {}", config.port);
        Ok(())
    }

    /// Configures and opens the device in one step.
    ///
    /// Any previously open device is released first. On failure the session
    /// is left unconfigured.
    pub fn connect(&mut self, config: SerialConfig) -> Result<()> {
        self.configure(config)?;
        if let Err(e) = self.open() {
            tracing::debug!("connect failed: {}", e);
            self.config = None;
            self.state = SessionState::Unconfigured;
            return Err(e);
        }
        Ok(())
    }

    /// Closes the device if open. Calling it again is a no-op.
    ///
    /// The configuration is kept so [`Self::open`] can reopen the device.
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Open {
            return;
        }

        self.transport.close();
        self.decoder.clear();
        self.state = SessionState::Closed;
        tracing::info!("disconnected");
    }

    /// Frames `payload` and writes it in a single transport call.
    ///
    /// Returns the number of frame bytes written. A short write is reported
    /// as [`Error::WriteIncomplete`] and never retried.
    pub fn send_command(&mut self, payload: &[u8]) -> Result<usize> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let frame = encode_frame(payload).map_err(|e| match e {
            FrameError::TooLarge { size, max } => Error::PayloadTooLarge { size, max },
            other => Error::InvalidPayload(other),
        })?;

        tracing::trace!("sending frame: {}", hex::encode(&frame));
        let written = self.transport.write(&frame).map_err(Error::WriteFailed)?;
        if written != frame.len() {
            return Err(Error::WriteIncomplete {
                written,
                expected: frame.len(),
            });
        }

        Ok(written)
    }

    /// Waits for one response frame and returns at most `max_len` payload bytes.
    ///
    /// Bytes are read in small chunks until a frame validates, the
    /// accumulation buffer fills up, or `timeout` elapses. Payload beyond
    /// `max_len` is dropped silently once the checksum has passed. A bad
    /// checksum or a malformed frame fails immediately instead of waiting
    /// out the deadline.
    pub fn read_response(&mut self, max_len: usize, timeout: Duration) -> Result<Bytes> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        self.decoder.clear();
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(
                    "no complete frame within {:?} ({} bytes buffered)",
                    timeout,
                    self.decoder.buffered()
                );
                self.decoder.clear();
                return Err(Error::timeout(timeout));
            }

            let wait = remaining.min(self.chunk_timeout);
            let n = self
                .transport
                .read(&mut chunk, wait)
                .map_err(Error::ReadFailed)?;
            if n == 0 {
                continue;
            }

            tracing::trace!("received {} bytes: {}", n, hex::encode(&chunk[..n]));
            self.decoder.feed(&chunk[..n]);

            match self.decoder.decode() {
                Ok(Some(mut payload)) => {
                    self.decoder.clear();
                    payload.truncate(max_len);
                    return Ok(payload);
                }
                Ok(None) => {}
                Err(FrameError::ChecksumMismatch { expected, actual }) => {
                    tracing::warn!(
                        "checksum mismatch: expected {:#04x}, got {:#04x}",
                        expected,
                        actual
                    );
                    return Err(Error::ChecksumMismatch { expected, actual });
                }
                Err(e) => {
                    tracing::warn!("malformed response: {}", e);
                    return Err(Error::Malformed(e));
                }
            }
        }
    }

    /// Sends `payload` and waits for the response.
    pub fn request(&mut self, payload: &[u8], max_len: usize, timeout: Duration) -> Result<Bytes> {
        self.send_command(payload)?;
        self.read_response(max_len, timeout)
    }

    /// Sends `payload` and waits for the response with the default limits.
    pub fn execute(&mut self, payload: &[u8]) -> Result<Bytes> {
        self.request(payload, MAX_FRAME_SIZE, DEFAULT_RESPONSE_TIMEOUT)
    }

    /// Discards data pending in the transport buffers.
    pub fn flush(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.decoder.clear();
        self.transport.flush()?;
        Ok(())
    }
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("chunk_timeout", &self.chunk_timeout)
            .finish_non_exhaustive()
    }
}
