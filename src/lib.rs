//! # openbsc
//!
//! A Rust client library for devices speaking the Open BSC framed serial
//! protocol.
//!
//! Commands travel as `STX | payload | ETX | BCC` frames over a serial
//! link; each exchange writes one frame and waits, under a timeout, for one
//! validated response frame.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use openbsc::{SerialConfig, Session};
//!
//! fn main() -> Result<(), openbsc::Error> {
//!     let mut session = Session::serial();
//!     session.connect(SerialConfig::new("/dev/ttyUSB0").baud_rate(115_200))?;
//!
//!     let answer = session.request(b"V", 256, Duration::from_secs(1))?;
//!     println!("Firmware: {}", String::from_utf8_lossy(&answer));
//!
//!     session.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Frame encoding, decoding and the BCC checksum
//! - [`transport`] - Byte-level device access (serial backend)
//! - [`session`] - Synchronous request/response over one transport
//! - [`registry`] - Sessions addressed by integer handles
//! - [`ports`] - Serial port discovery

pub mod error;
pub mod ports;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::{Error, ErrorCode, FrameError, Result};
pub use ports::{PortDescriptor, find_port, find_ports};
pub use protocol::{FrameDecoder, MAX_FRAME_SIZE, decode_frame, encode_frame};
pub use registry::{Handle, INVALID_HANDLE, InstanceRegistry};
pub use session::{DEFAULT_RESPONSE_TIMEOUT, Session, SessionState};
pub use transport::{Parity, SerialConfig, SerialTransport, Transport};
