//! Error types for the openbsc library.

use std::io;

use thiserror::Error;

/// The main error type for openbsc operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port library error (enumeration and similar).
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error outside of a write or read exchange (e.g. flush).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The named device does not exist.
    #[error("port not found: {port}")]
    PortNotFound { port: String },

    /// The device exists but could not be opened or configured.
    #[error("port {port} unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// Line parameters were rejected before touching the device.
    #[error("configuration rejected: {reason}")]
    ConfigRejected { reason: String },

    /// `open` was called on a session that has no stored configuration.
    #[error("session has no configuration")]
    NotConfigured,

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// The encoded frame would exceed the maximum frame size.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload cannot be framed for another reason.
    #[error("invalid payload: {0}")]
    InvalidPayload(FrameError),

    /// The transport accepted fewer bytes than the frame holds.
    #[error("incomplete write: {written} of {expected} bytes")]
    WriteIncomplete { written: usize, expected: usize },

    /// The transport failed while writing a frame.
    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// The transport failed while reading a response.
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),

    /// No complete frame arrived before the deadline.
    #[error("response timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A complete frame arrived but its BCC did not match.
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The device answered with something that is not a valid frame.
    #[error("malformed response: {0}")]
    Malformed(FrameError),

    /// The registry handle does not name a live session.
    #[error("invalid handle: {0}")]
    InvalidHandle(i64),

    /// Every handle the registry may hand out is in use.
    #[error("registry full: all {limit} handles in use")]
    RegistryFull { limit: usize },
}

impl Error {
    /// Maps this error onto the caller-facing [`ErrorCode`] vocabulary.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ConfigRejected { .. } => ErrorCode::ConfigFailed,
            Self::NotConfigured
            | Self::InvalidHandle(_)
            | Self::PayloadTooLarge { .. }
            | Self::InvalidPayload(_)
            | Self::Malformed(_) => ErrorCode::InvalidFormat,
            Self::PortNotFound { .. } => ErrorCode::NotFound,
            Self::PortUnavailable { .. } | Self::NotConnected | Self::RegistryFull { .. } => {
                ErrorCode::OpenFailed
            }
            Self::WriteIncomplete { .. } | Self::WriteFailed(_) => ErrorCode::SendFailed,
            Self::ReadFailed(_) | Self::Io(_) | Self::Serial(_) => ErrorCode::NoData,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::ChecksumMismatch { .. } => ErrorCode::ChecksumMismatch,
        }
    }

    pub(crate) fn timeout(timeout: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Frame-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Nothing to encode, or a frame without payload bytes.
    #[error("empty frame")]
    Empty,

    /// Frame exceeds maximum size.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    /// Payload contains the end marker, which the wire format cannot carry.
    #[error("payload byte {index} is the reserved end marker")]
    ReservedByte { index: usize },

    /// No STX byte in the input.
    #[error("no start marker")]
    NoStartMarker,

    /// No ETX byte after the start marker.
    #[error("no end marker")]
    NoEndMarker,

    /// Input ends right after the ETX byte.
    #[error("missing checksum byte")]
    MissingChecksum,

    /// Received BCC differs from the computed one.
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

impl FrameError {
    /// Returns true if more input could still turn this into a valid frame.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::NoStartMarker | Self::NoEndMarker | Self::MissingChecksum
        )
    }
}

/// Caller-facing error codes for handle-based callers.
///
/// This is the closed vocabulary exposed across the registry boundary; see
/// [`Error::code`] for how each [`Error`] maps onto it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// No error.
    #[default]
    None = 0,
    /// Invalid parameter, handle or response format.
    InvalidFormat,
    /// Device not found.
    NotFound,
    /// Device could not be opened, or is not open.
    OpenFailed,
    /// Line parameters rejected.
    ConfigFailed,
    /// Frame could not be written.
    SendFailed,
    /// Reading or flushing failed.
    NoData,
    /// No response before the deadline.
    Timeout,
    /// Response failed its BCC check.
    ChecksumMismatch,
}

impl ErrorCode {
    /// Returns the code for a result, [`ErrorCode::None`] on success.
    #[must_use]
    pub const fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::None,
            Err(e) => e.code(),
        }
    }
}

impl From<&Error> for ErrorCode {
    fn from(err: &Error) -> Self {
        err.code()
    }
}

/// Result type alias for openbsc operations.
pub type Result<T> = std::result::Result<T, Error>;
