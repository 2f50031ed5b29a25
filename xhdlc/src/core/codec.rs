//! Byte stuffing encoder and streaming decoder.
//!
//! The decoder is stateful: bytes may arrive in arbitrary chunks and a
//! frame split across calls is completed by a later call. Corrupt frames
//! are reported as discards and the decoder keeps scanning, so a damaged
//! frame never blocks the ones behind it.

use alloc::vec::Vec;

use super::fcs::Fcs16;
use super::frame::{
    BROADCAST_ADDRESS, ESCAPE, ESCAPE_XOR, FLAG, FRAME_OVERHEAD, Frame, FrameKind, accepts_address,
    encode_control, is_data_control,
};
use super::sequence::Sequence;
use crate::error::{Error, Result};

/// Worst-case wire size of an ACK or NACK: two flags plus four fully
/// stuffed body bytes.
pub const SUPERVISORY_FRAME_MAX: usize = 2 + 2 * FRAME_OVERHEAD;

/// Encoded ACK/NACK frame. Needs no allocation.
pub type SupervisoryFrame = heapless::Vec<u8, SUPERVISORY_FRAME_MAX>;

/// Why a frame was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Carries the unverified address and control bytes of the body.
    #[error("frame check sequence mismatch (control {control:#04x})")]
    ChecksumMismatch { address: u8, control: u8 },

    #[error("malformed frame: {0}")]
    MalformedFrame(Malformed),

    #[error("frame exceeds {max} payload bytes")]
    Oversized { max: usize },
}

impl FrameError {
    /// True when a checksum failure hit what looks like a DATA frame for
    /// station `local`.
    ///
    /// Line noise between flags also fails the checksum; its header only
    /// passes this test by chance.
    pub fn is_damaged_data(&self, local: u8) -> bool {
        match *self {
            Self::ChecksumMismatch { address, control } => {
                is_data_control(control) && accepts_address(address, local)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    #[error("body shorter than address, control and FCS")]
    TooShort,

    #[error("escape immediately before flag")]
    DanglingEscape,

    #[error("escape followed by escape")]
    InvalidEscape,

    #[error("unsupported control field")]
    UnsupportedControl,

    #[error("supervisory frame carries payload")]
    SupervisoryPayload,
}

/// Outcome of one [`Decoder::decode`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A verified frame.
    Frame(Frame),

    /// A delimited frame failed verification and was dropped.
    Discarded(FrameError),

    /// All input was consumed without completing a frame.
    NeedMoreData,
}

#[inline]
fn stuff_byte(byte: u8, mut sink: impl FnMut(u8)) {
    if byte == FLAG || byte == ESCAPE {
        sink(ESCAPE);
        sink(byte ^ ESCAPE_XOR);
    } else {
        sink(byte);
    }
}

/// Serializes frames for one station.
#[derive(Debug, Clone)]
pub struct Encoder {
    address: u8,
    max_payload: usize,
}

impl Encoder {
    pub fn new(address: u8, max_payload: usize) -> Self {
        Self { address, max_payload }
    }

    /// Encodes one frame. Identical inputs always give identical bytes.
    pub fn encode(&self, kind: FrameKind, sequence: Sequence, payload: &[u8]) -> Result<Vec<u8>> {
        let mut dst = Vec::with_capacity(2 + 2 * (FRAME_OVERHEAD + payload.len()));
        self.encode_into(kind, sequence, payload, &mut dst)?;
        Ok(dst)
    }

    /// Appends one encoded frame to `dst` and returns the bytes written.
    pub fn encode_into(
        &self,
        kind: FrameKind,
        sequence: Sequence,
        payload: &[u8],
        dst: &mut Vec<u8>,
    ) -> Result<usize> {
        if payload.len() > self.max_payload {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }
        let payload = if kind.has_payload() { payload } else { &[] };

        let start = dst.len();
        let mut fcs = Fcs16::new();
        dst.push(FLAG);

        for &byte in [self.address, encode_control(kind, sequence)].iter().chain(payload) {
            fcs.push(byte);
            stuff_byte(byte, |b| dst.push(b));
        }
        for byte in fcs.finalize().to_le_bytes() {
            stuff_byte(byte, |b| dst.push(b));
        }

        dst.push(FLAG);
        Ok(dst.len() - start)
    }

    /// Encodes an ACK or NACK into a fixed-capacity buffer.
    pub fn encode_supervisory(&self, kind: FrameKind, sequence: Sequence) -> SupervisoryFrame {
        let mut dst = SupervisoryFrame::new();
        let mut fcs = Fcs16::new();

        // Capacity covers every body byte being stuffed, so pushes cannot fail.
        let _ = dst.push(FLAG);
        for byte in [self.address, encode_control(kind, sequence)] {
            fcs.push(byte);
            stuff_byte(byte, |b| {
                let _ = dst.push(b);
            });
        }
        for byte in fcs.finalize().to_le_bytes() {
            stuff_byte(byte, |b| {
                let _ = dst.push(b);
            });
        }
        let _ = dst.push(FLAG);

        dst
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(BROADCAST_ADDRESS, crate::DEFAULT_BUFFER_SIZE)
    }
}

/// Streaming frame decoder.
#[derive(Debug)]
pub struct Decoder {
    max_payload: usize,
    hunting: bool,
    body: Vec<u8>,
    escaped: bool,
    invalid_escape: bool,
    oversized: bool,
}

impl Decoder {
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload,
            hunting: true,
            body: Vec::with_capacity(max_payload + FRAME_OVERHEAD),
            escaped: false,
            invalid_escape: false,
            oversized: false,
        }
    }

    /// Consumes bytes from `src` until a frame completes, a frame is
    /// discarded, or the input runs out.
    ///
    /// Returns the outcome and the number of bytes consumed. Callers feed
    /// the remainder back in until `NeedMoreData` comes out.
    pub fn decode(&mut self, src: &[u8]) -> (Decoded, usize) {
        for (i, &byte) in src.iter().enumerate() {
            if byte == FLAG {
                if self.hunting {
                    self.hunting = false;
                    self.clear_body();
                    continue;
                }
                if self.is_idle() {
                    // Repeated flag, idle fill.
                    continue;
                }
                let outcome = self.finish();
                self.clear_body();
                return (outcome, i + 1);
            }

            if self.hunting {
                continue;
            }

            if byte == ESCAPE {
                if self.escaped {
                    self.invalid_escape = true;
                }
                self.escaped = true;
                continue;
            }

            let value = if self.escaped { byte ^ ESCAPE_XOR } else { byte };
            self.escaped = false;

            if self.body.len() >= self.max_payload + FRAME_OVERHEAD {
                self.oversized = true;
            } else {
                self.body.push(value);
            }
        }

        (Decoded::NeedMoreData, src.len())
    }

    /// Decodes everything in `src`, collecting frames and discards in order.
    pub fn decode_all(&mut self, mut src: &[u8]) -> Vec<Decoded> {
        let mut out = Vec::new();
        while !src.is_empty() {
            let (decoded, consumed) = self.decode(src);
            src = &src[consumed..];
            if decoded != Decoded::NeedMoreData {
                out.push(decoded);
            }
        }
        out
    }

    /// Drops any partial frame and waits for the next flag.
    pub fn reset(&mut self) {
        self.hunting = true;
        self.clear_body();
    }

    /// Bytes of a partial frame currently buffered.
    pub fn buffered(&self) -> usize {
        self.body.len()
    }

    fn is_idle(&self) -> bool {
        self.body.is_empty() && !self.escaped && !self.invalid_escape && !self.oversized
    }

    fn clear_body(&mut self) {
        self.body.clear();
        self.escaped = false;
        self.invalid_escape = false;
        self.oversized = false;
    }

    fn finish(&self) -> Decoded {
        if self.escaped {
            return Decoded::Discarded(FrameError::MalformedFrame(Malformed::DanglingEscape));
        }
        if self.invalid_escape {
            return Decoded::Discarded(FrameError::MalformedFrame(Malformed::InvalidEscape));
        }
        if self.oversized {
            return Decoded::Discarded(FrameError::Oversized {
                max: self.max_payload,
            });
        }
        if self.body.len() < FRAME_OVERHEAD {
            return Decoded::Discarded(FrameError::MalformedFrame(Malformed::TooShort));
        }
        if !Fcs16::verify_trailing(&self.body) {
            return Decoded::Discarded(FrameError::ChecksumMismatch {
                address: self.body[0],
                control: self.body[1],
            });
        }

        match Frame::from_body(&self.body) {
            Ok(frame) => Decoded::Frame(frame),
            Err(err) => Decoded::Discarded(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const FRAME_ACK: [u8; 6] = [0x7E, 0xFF, 0x41, 0x0A, 0xA3, 0x7E];
    const FRAME_NACK: [u8; 6] = [0x7E, 0xFF, 0x29, 0x44, 0x4C, 0x7E];
    const FRAME_DATA: [u8; 7] = [0x7E, 0xFF, 0x12, 0x55, 0x36, 0xA3, 0x7E];
    const FRAME_DATA_INVALID: [u8; 7] = [0x7E, 0xFF, 0x12, 0x33, 0x67, 0xF8, 0x7E];

    fn frames(decoded: Vec<Decoded>) -> Vec<Frame> {
        decoded
            .into_iter()
            .filter_map(|d| match d {
                Decoded::Frame(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_encode_reference_frames() {
        let encoder = Encoder::new(BROADCAST_ADDRESS, 64);
        assert_eq!(
            encoder.encode(FrameKind::Data, Sequence::new(1), &[0x55]).unwrap(),
            FRAME_DATA
        );
        assert_eq!(
            encoder.encode(FrameKind::Ack, Sequence::new(2), &[]).unwrap(),
            FRAME_ACK
        );
        assert_eq!(
            encoder.encode_supervisory(FrameKind::Nack, Sequence::new(1)).as_slice(),
            FRAME_NACK
        );
    }

    #[test]
    fn test_encode_payload_too_large() {
        let encoder = Encoder::new(BROADCAST_ADDRESS, 8);
        let result = encoder.encode(FrameKind::Data, Sequence::FIRST, &[0u8; 9]);
        assert!(matches!(result, Err(Error::PayloadTooLarge { size: 9, max: 8 })));
    }

    #[test]
    fn test_roundtrip_with_reserved_bytes() {
        let encoder = Encoder::new(BROADCAST_ADDRESS, 256);
        let payload: Vec<u8> = (0..=255u8).collect();
        let wire = encoder.encode(FrameKind::Data, Sequence::new(5), &payload).unwrap();

        // Only the delimiters may be raw flags.
        assert_eq!(wire.iter().filter(|&&b| b == FLAG).count(), 2);

        let mut decoder = Decoder::new(256);
        let (decoded, consumed) = decoder.decode(&wire);
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded, Decoded::Frame(Frame::data(Sequence::new(5), payload)));
    }

    #[test]
    fn test_escaped_flag_and_escape() {
        let encoder = Encoder::new(BROADCAST_ADDRESS, 64);
        let wire = encoder.encode(FrameKind::Data, Sequence::FIRST, &[FLAG]).unwrap();
        assert_eq!(wire.len(), FRAME_DATA.len() + 1);

        let wire2 = encoder.encode(FrameKind::Data, Sequence::FIRST, &[ESCAPE]).unwrap();
        assert_eq!(wire2.len(), FRAME_DATA.len() + 1);

        let mut decoder = Decoder::new(64);
        let got = frames(decoder.decode_all(&[wire, wire2].concat()));
        assert_eq!(got[0].payload, vec![FLAG]);
        assert_eq!(got[1].payload, vec![ESCAPE]);
    }

    #[test]
    fn test_decode_supervisory() {
        let mut decoder = Decoder::new(64);
        assert_eq!(
            decoder.decode(&FRAME_ACK).0,
            Decoded::Frame(Frame::ack(Sequence::new(2)))
        );
        assert_eq!(
            decoder.decode(&FRAME_NACK).0,
            Decoded::Frame(Frame::nack(Sequence::new(1)))
        );
    }

    #[test]
    fn test_decode_invalid_checksum() {
        let mut decoder = Decoder::new(64);
        let (decoded, consumed) = decoder.decode(&FRAME_DATA_INVALID);
        assert_eq!(
            decoded,
            Decoded::Discarded(FrameError::ChecksumMismatch {
                address: 0xFF,
                control: 0x12
            })
        );
        assert_eq!(consumed, FRAME_DATA_INVALID.len());
    }

    #[test]
    fn test_damaged_data_needs_data_header() {
        let mut decoder = Decoder::new(64);
        let (damaged, _) = decoder.decode(&FRAME_DATA_INVALID);
        let Decoded::Discarded(err) = damaged else {
            panic!("expected discard, got {:?}", damaged);
        };
        assert!(err.is_damaged_data(BROADCAST_ADDRESS));
        assert!(err.is_damaged_data(0x03));

        // Noise between flags whose second byte is not a DATA control.
        let (noise, _) = decoder.decode(&[FLAG, 0x3C, 0x91, 0x5A, 0x07, FLAG]);
        let Decoded::Discarded(err) = noise else {
            panic!("expected discard, got {:?}", noise);
        };
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
        assert!(!err.is_damaged_data(BROADCAST_ADDRESS));

        // DATA header for another station.
        let other = FrameError::ChecksumMismatch {
            address: 0x05,
            control: 0x12,
        };
        assert!(!other.is_damaged_data(0x03));
        assert!(!FrameError::MalformedFrame(Malformed::TooShort).is_damaged_data(0x03));
    }

    #[test]
    fn test_decode_in_chunks() {
        let mut decoder = Decoder::new(64);
        assert_eq!(decoder.decode(&FRAME_DATA[..3]), (Decoded::NeedMoreData, 3));
        assert_eq!(decoder.buffered(), 2);

        let (decoded, consumed) = decoder.decode(&FRAME_DATA[3..]);
        assert_eq!(consumed, 4);
        assert_eq!(decoded, Decoded::Frame(Frame::data(Sequence::new(1), vec![0x55])));
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut decoder = Decoder::new(64);
        let mut got = Vec::new();
        for &byte in FRAME_DATA.iter() {
            if let (Decoded::Frame(frame), _) = decoder.decode(&[byte]) {
                got.push(frame);
            }
        }
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].payload, vec![0x55]);
    }

    #[test]
    fn test_noise_and_double_flags() {
        let mut stream = vec![0x01, 0x02, 0x03, FLAG];
        stream.extend_from_slice(&FRAME_DATA);
        stream.extend_from_slice(&[FLAG, FLAG]);
        stream.extend_from_slice(&FRAME_ACK);

        let mut decoder = Decoder::new(64);
        let got = frames(decoder.decode_all(&stream));
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].kind, FrameKind::Data);
        assert_eq!(got[1].kind, FrameKind::Ack);
    }

    #[test]
    fn test_garbage_between_frames_is_discarded() {
        let mut stream = FRAME_DATA.to_vec();
        stream.extend_from_slice(&[0x09, 0x09]);
        stream.extend_from_slice(&FRAME_ACK);

        let mut decoder = Decoder::new(64);
        let decoded = decoder.decode_all(&stream);
        assert_eq!(
            decoded,
            vec![
                Decoded::Frame(Frame::data(Sequence::new(1), vec![0x55])),
                Decoded::Discarded(FrameError::MalformedFrame(Malformed::TooShort)),
                Decoded::Frame(Frame::ack(Sequence::new(2))),
            ]
        );
    }

    #[test]
    fn test_resync_after_truncated_frame() {
        // A frame cut short by a flag, then a complete frame in later chunks.
        let chunks: [&[u8]; 7] = [
            &[0x7E, 0xFF, 0x12, 0x12, 0x00, 0x00, 0xAF, 0x7E],
            &[0x7E, 0xFF, 0x14, 0x4A, 0x07, 0x0A, 0x7E, 0xFF, 0x14],
            &[0x4A, 0x07, 0x0A, 0x01, 0x00, 0x10, 0x01, 0x20, 0x64, 0xCA, 0x51, 0x7E],
            &[0x7E, 0xFF, 0x14],
            &[0x4A, 0x07, 0x0A, 0x01, 0x00, 0x10, 0x01, 0x20, 0x64, 0xCA],
            &[0x51, 0x7E],
            &[0x7E, 0xFF, 0x21, 0x0C, 0xC0, 0x7E],
        ];
        let mut decoder = Decoder::new(64);
        let lens: Vec<Vec<usize>> = chunks
            .iter()
            .map(|chunk| {
                frames(decoder.decode_all(chunk))
                    .iter()
                    .map(|f| f.payload.len())
                    .collect()
            })
            .collect();

        assert_eq!(
            lens,
            vec![vec![2], vec![], vec![9], vec![], vec![], vec![9], vec![0]]
        );
    }

    #[test]
    fn test_single_bit_flip_is_discarded_and_next_frame_survives() {
        let encoder = Encoder::new(BROADCAST_ADDRESS, 16);
        let victim = encoder
            .encode(FrameKind::Data, Sequence::new(3), b"he\x7e\x7dlo")
            .unwrap();
        let next = encoder.encode(FrameKind::Data, Sequence::new(4), b"next").unwrap();

        for pos in 1..victim.len() - 1 {
            for bit in 0..8 {
                let mut stream = victim.clone();
                stream[pos] ^= 1 << bit;
                stream.extend_from_slice(&next);

                let mut decoder = Decoder::new(16);
                let got = frames(decoder.decode_all(&stream));
                assert_eq!(
                    got,
                    vec![Frame::data(Sequence::new(4), &b"next"[..])],
                    "byte {pos} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let big = Encoder::new(BROADCAST_ADDRESS, 32)
            .encode(FrameKind::Data, Sequence::FIRST, &[0xAA; 32])
            .unwrap();

        let mut decoder = Decoder::new(8);
        let mut stream = big;
        stream.extend_from_slice(&FRAME_ACK);
        let decoded = decoder.decode_all(&stream);
        assert_eq!(decoded[0], Decoded::Discarded(FrameError::Oversized { max: 8 }));
        assert_eq!(decoded[1], Decoded::Frame(Frame::ack(Sequence::new(2))));
        assert!(decoder.buffered() <= 8 + FRAME_OVERHEAD);
    }

    #[test]
    fn test_dangling_escape() {
        let mut decoder = Decoder::new(8);
        let decoded = decoder.decode_all(&[FLAG, 0xFF, 0x12, ESCAPE, FLAG]);
        assert_eq!(
            decoded,
            vec![Decoded::Discarded(FrameError::MalformedFrame(
                Malformed::DanglingEscape
            ))]
        );
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut decoder = Decoder::new(64);
        decoder.decode(&FRAME_DATA[..4]);
        decoder.reset();
        // Tail of the old frame is noise while hunting.
        assert!(frames(decoder.decode_all(&FRAME_DATA[4..])).is_empty());
        assert_eq!(frames(decoder.decode_all(&FRAME_DATA)).len(), 1);
    }
}
