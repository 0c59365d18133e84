//! Protocol definitions for Open BSC communication.
//!
//! This module contains the wire-level framing: start and end markers,
//! the block check character, and a streaming decoder for partial reads.

pub mod frame;

pub use frame::{
    ETX, FRAME_OVERHEAD, FrameDecoder, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, STX, bcc,
    decode as decode_frame, decode_truncated, encode as encode_frame,
};
