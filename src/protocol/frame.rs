//! Frame encoding and decoding for the Open BSC protocol.
//!
//! The wire format is a delimited frame with a trailing XOR checksum:
//! ```text
//! ┌──────┬─────────────┬──────┬──────┐
//! │ 0x02 │   payload   │ 0x03 │ BCC  │
//! │ STX  │ 1..N bytes  │ ETX  │      │
//! └──────┴─────────────┴──────┴──────┘
//! ```
//!
//! `BCC` is the XOR of every payload byte and the ETX byte. STX is not
//! covered. The payload is not escaped, so it can never contain ETX.
//!
//! The frame ends at the first ETX after STX, which limits what the checksum
//! can catch. A corrupted ETX leaves the frame without an end marker, so
//! [`decode`] reports [`FrameError::NoEndMarker`] rather than a checksum
//! mismatch. A payload byte one bit away from ETX (0x01, 0x02, 0x07, 0x0B,
//! 0x13, 0x23, 0x43, 0x83) can turn into an early ETX; when the byte after
//! it happens to equal the XOR so far, the damaged frame decodes as a valid,
//! shorter one. Any other single-bit flip in the payload fails
//! [`FrameError::ChecksumMismatch`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Start-of-text marker.
pub const STX: u8 = 0x02;

/// End-of-text marker.
pub const ETX: u8 = 0x03;

/// Maximum size of a whole frame, markers and checksum included.
pub const MAX_FRAME_SIZE: usize = 1024;

/// Bytes a frame adds around its payload (STX, ETX, BCC).
pub const FRAME_OVERHEAD: usize = 3;

/// Largest payload that fits in one frame.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - FRAME_OVERHEAD;

/// Computes the block check character over `data`.
#[must_use]
pub fn bcc(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Encodes a payload into a framed message.
///
/// # Errors
///
/// Returns a `FrameError` if:
/// - The payload is empty
/// - The frame would exceed [`MAX_FRAME_SIZE`]
/// - The payload contains [`ETX`]
pub fn encode(payload: &[u8]) -> Result<Bytes, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }

    let size = payload.len() + FRAME_OVERHEAD;
    if size > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }

    if let Some(index) = payload.iter().position(|&b| b == ETX) {
        return Err(FrameError::ReservedByte { index });
    }

    let mut buf = BytesMut::with_capacity(size);
    buf.put_u8(STX);
    buf.put_slice(payload);
    buf.put_u8(ETX);
    let check = bcc(&buf[1..]);
    buf.put_u8(check);
    Ok(buf.freeze())
}

/// Decodes the first frame found in `raw`, returning its payload.
///
/// Bytes before the first STX are ignored, as is anything after the BCC.
///
/// # Errors
///
/// Returns a `FrameError` if:
/// - `raw` is empty, or the frame carries no payload
/// - There is no STX, or no ETX after it
/// - The input stops right after ETX
/// - The received BCC does not match
pub fn decode(raw: &[u8]) -> Result<Bytes, FrameError> {
    let (start, end) = locate(raw)?;
    let payload = &raw[start + 1..end];
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }
    Ok(Bytes::copy_from_slice(payload))
}

/// Like [`decode`], but keeps at most `capacity` payload bytes.
///
/// Truncation is lossy and silent: the checksum is verified over the full
/// payload first, then the tail beyond `capacity` is dropped.
pub fn decode_truncated(raw: &[u8], capacity: usize) -> Result<Bytes, FrameError> {
    let mut payload = decode(raw)?;
    payload.truncate(capacity);
    Ok(payload)
}

/// Finds and checks the frame in `raw`, returning the STX and ETX offsets.
fn locate(raw: &[u8]) -> Result<(usize, usize), FrameError> {
    if raw.is_empty() {
        return Err(FrameError::Empty);
    }

    let start = raw
        .iter()
        .position(|&b| b == STX)
        .ok_or(FrameError::NoStartMarker)?;
    let end = raw[start + 1..]
        .iter()
        .position(|&b| b == ETX)
        .map(|i| start + 1 + i)
        .ok_or(FrameError::NoEndMarker)?;
    let actual = *raw.get(end + 1).ok_or(FrameError::MissingChecksum)?;

    let expected = bcc(&raw[start + 1..=end]);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok((start, end))
}

/// Frame decoder that handles partial data.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Creates a new frame decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Returns `Ok(Some(payload))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or an error if the buffered bytes
    /// can never become a valid frame. Noise before STX is discarded.
    ///
    /// # Errors
    ///
    /// Returns a `FrameError` if:
    /// - A complete frame fails its checksum or carries no payload
    /// - The buffer holds [`MAX_FRAME_SIZE`] bytes without a complete frame
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        match self.buffer.iter().position(|&b| b == STX) {
            Some(0) => {}
            Some(start) => {
                tracing::debug!("discarding {} bytes before start marker", start);
                self.buffer.advance(start);
            }
            None => {
                if !self.buffer.is_empty() {
                    tracing::debug!("discarding {} bytes without start marker", self.buffer.len());
                    self.buffer.clear();
                }
                return Ok(None);
            }
        }

        match decode(&self.buffer) {
            Ok(payload) => {
                let end = payload.len() + FRAME_OVERHEAD;
                self.buffer.advance(end);
                Ok(Some(payload))
            }
            Err(e) if e.is_incomplete() => {
                if self.buffer.len() >= MAX_FRAME_SIZE {
                    let size = self.buffer.len();
                    self.buffer.clear();
                    return Err(FrameError::TooLarge {
                        size,
                        max: MAX_FRAME_SIZE,
                    });
                }
                Ok(None)
            }
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_version_command() {
        let frame = encode(b"V").unwrap();
        assert_eq!(&frame[..], &[0x02, 0x56, 0x03, 0x55]);
    }

    #[test]
    fn test_encode_checksum_excludes_stx() {
        let frame = encode(b"AB").unwrap();
        assert_eq!(frame[frame.len() - 1], b'A' ^ b'B' ^ ETX);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = [b'x'; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(
            encode(&payload),
            Err(FrameError::TooLarge {
                size: MAX_FRAME_SIZE + 1,
                max: MAX_FRAME_SIZE
            })
        );
    }

    #[test]
    fn test_encode_largest_payload() {
        let payload = vec![b'x'; MAX_PAYLOAD_SIZE];
        let frame = encode(&payload).unwrap();
        assert_eq!(frame.len(), MAX_FRAME_SIZE);
        assert_eq!(decode(&frame).unwrap(), Bytes::from(payload));
    }

    #[test]
    fn test_encode_rejects_empty_and_etx() {
        assert_eq!(encode(b""), Err(FrameError::Empty));
        assert_eq!(
            encode(&[b'a', ETX, b'b']),
            Err(FrameError::ReservedByte { index: 1 })
        );
    }

    #[test]
    fn test_round_trip_with_stx_in_payload() {
        let payload = [STX, 0x00, 0xff, b'z'];
        let frame = encode(&payload).unwrap();
        assert_eq!(decode(&frame).unwrap(), Bytes::copy_from_slice(&payload));
    }

    #[test]
    fn test_decode_skips_leading_noise() {
        let raw = [0xff, 0x00, 0x7e, 0x02, 0x56, 0x03, 0x55, 0xaa];
        assert_eq!(decode(&raw).unwrap(), Bytes::from_static(b"V"));
    }

    #[test]
    fn test_decode_marker_errors() {
        assert_eq!(decode(&[]), Err(FrameError::Empty));
        assert_eq!(decode(b"hello"), Err(FrameError::NoStartMarker));
        assert_eq!(decode(&[0x02, b'h', b'i']), Err(FrameError::NoEndMarker));
        assert_eq!(decode(&[0x02, b'h', 0x03]), Err(FrameError::MissingChecksum));
        assert_eq!(decode(&[0x02, 0x03, 0x03]), Err(FrameError::Empty));
    }

    #[test]
    fn test_etx_before_stx_is_not_an_end_marker() {
        assert_eq!(decode(&[0x03, 0x02, b'h']), Err(FrameError::NoEndMarker));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        assert_eq!(
            decode(&[0x02, 0x56, 0x03, 0x54]),
            Err(FrameError::ChecksumMismatch {
                expected: 0x55,
                actual: 0x54
            })
        );
    }

    #[test]
    fn test_round_trip_every_byte_value() {
        let payload: Vec<u8> = (0..=u8::MAX).filter(|&b| b != ETX).collect();
        let frame = encode(&payload).unwrap();
        assert_eq!(decode(&frame).unwrap(), Bytes::from(payload.clone()));

        for b in payload {
            let frame = encode(&[b]).unwrap();
            assert_eq!(&decode(&frame).unwrap()[..], &[b]);
        }
    }

    #[test]
    fn test_single_bit_flip_in_payload_is_detected() {
        let frame = encode(b"V1.0").unwrap();
        for byte in 1..frame.len() - 2 {
            for bit in 0..8 {
                let mut corrupted = frame.to_vec();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    matches!(
                        decode(&corrupted),
                        Err(FrameError::ChecksumMismatch { .. })
                    ),
                    "flip of bit {bit} in byte {byte} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn test_bit_flip_near_etx_never_returns_original() {
        let payload = [b'V', 0x01, 0x02, 0x07, 0x0b, 0x13, 0x23, 0x43, 0x83, b'0'];
        let frame = encode(&payload).unwrap();

        for byte in 1..=payload.len() {
            for bit in 0..8 {
                let mut corrupted = frame.to_vec();
                corrupted[byte] ^= 1 << bit;
                let result = decode(&corrupted);

                if corrupted[byte] == ETX {
                    // Early end marker: either caught or read as a shorter frame.
                    match result {
                        Ok(short) => assert_eq!(&short[..], &payload[..byte - 1]),
                        Err(e) => assert!(
                            matches!(e, FrameError::ChecksumMismatch { .. } | FrameError::Empty),
                            "unexpected {e:?} for bit {bit} in byte {byte}"
                        ),
                    }
                } else {
                    assert!(
                        matches!(result, Err(FrameError::ChecksumMismatch { .. })),
                        "flip of bit {bit} in byte {byte} went unnoticed"
                    );
                }
            }
        }
    }

    #[test]
    fn test_bit_flip_into_early_etx_can_pass() {
        let frame = encode(&[0x41, 0x07, 0x42]).unwrap();
        assert_eq!(&frame[..], &[0x02, 0x41, 0x07, 0x42, 0x03, 0x07]);

        let mut corrupted = frame.to_vec();
        corrupted[2] ^= 1 << 2;
        assert_eq!(decode(&corrupted).unwrap(), Bytes::from_static(b"A"));
    }

    #[test]
    fn test_bit_flip_in_etx_loses_end_marker() {
        let frame = encode(b"V1.0").unwrap();
        let etx = frame.len() - 2;
        for bit in 0..8 {
            let mut corrupted = frame.to_vec();
            corrupted[etx] ^= 1 << bit;
            assert_eq!(decode(&corrupted), Err(FrameError::NoEndMarker));
        }
    }

    #[test]
    fn test_decode_truncated_is_lossy() {
        let frame = encode(b"HELLO").unwrap();
        assert_eq!(
            decode_truncated(&frame, 2).unwrap(),
            Bytes::from_static(b"HE")
        );
        assert_eq!(
            decode_truncated(&frame, 64).unwrap(),
            Bytes::from_static(b"HELLO")
        );
    }

    #[test]
    fn test_decoder_partial_frame() {
        let mut decoder = FrameDecoder::new();

        decoder.feed(&[0x02, b'o']);
        assert_eq!(decoder.decode().unwrap(), None);

        decoder.feed(&[b'k', 0x03]);
        assert_eq!(decoder.decode().unwrap(), None);

        decoder.feed(&[b'o' ^ b'k' ^ 0x03]);
        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"ok")));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_drops_noise() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x00, 0xff, 0x10]);
        assert_eq!(decoder.decode().unwrap(), None);
        assert_eq!(decoder.buffered(), 0);

        decoder.feed(&[0x11, 0x02, 0x56]);
        assert_eq!(decoder.decode().unwrap(), None);
        assert_eq!(decoder.buffered(), 2);
    }

    #[test]
    fn test_decoder_multiple_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&encode(b"hi").unwrap());
        decoder.feed(&encode(b"bye").unwrap());

        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"hi")));
        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"bye")));
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn test_decoder_fails_fast_on_bad_checksum() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x02, 0x56, 0x03, 0x00]);
        assert!(matches!(
            decoder.decode(),
            Err(FrameError::ChecksumMismatch { .. })
        ));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_overflow() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[STX]);
        decoder.feed(&[b'x'; MAX_FRAME_SIZE]);
        assert!(matches!(
            decoder.decode(),
            Err(FrameError::TooLarge { .. })
        ));
    }
}
