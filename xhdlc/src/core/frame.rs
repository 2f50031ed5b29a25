//! Frame definition and HDLC control byte layout.
//!
//! # Frame Format
//!
//! ```text
//! +------+---------+---------+-------------------+-----------+------+
//! | 0x7E | Address | Control | Payload (0..N)    | FCS (LE)  | 0x7E |
//! +------+---------+---------+-------------------+-----------+------+
//!          \_______________ byte stuffed ________________/
//! ```
//!
//! Control byte (bit 0 is the least significant bit):
//!
//! ```text
//!          7   6   5   4   3   2   1   0
//! DATA   [   0 0 0   | P |   N(S)    | 0 ]   I-frame, poll bit set
//! ACK    [   N(R)    | 0 | 0   0 | 0   1 ]   RR S-frame
//! NACK   [   N(R)    | 0 | 1   0 | 0   1 ]   REJ S-frame
//! ```

use alloc::vec::Vec;

use super::codec::{FrameError, Malformed};
use super::fcs::FCS_SIZE;
use super::sequence::Sequence;

/// Opening and closing flag.
pub const FLAG: u8 = 0x7E;

/// Control escape. The following byte is XORed with [`ESCAPE_XOR`].
pub const ESCAPE: u8 = 0x7D;

/// Value XORed into an escaped byte.
pub const ESCAPE_XOR: u8 = 0x20;

/// The all-station address.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Address + control + FCS.
pub const FRAME_OVERHEAD: usize = 2 + FCS_SIZE;

const CONTROL_S_FRAME_BIT: u8 = 0;
const CONTROL_SEND_SEQ_BIT: u8 = 1;
const CONTROL_S_TYPE_BIT: u8 = 2;
const CONTROL_POLL_BIT: u8 = 4;
const CONTROL_RECV_SEQ_BIT: u8 = 5;

const S_TYPE_RECEIVE_READY: u8 = 0;
const S_TYPE_REJECT: u8 = 2;

/// What a frame means to the ARQ engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Information frame carrying payload.
    Data,

    /// Receive Ready: acknowledges everything before N(R).
    Ack,

    /// Reject: asks the peer to resend N(R).
    Nack,
}

impl FrameKind {
    pub const fn has_payload(&self) -> bool {
        matches!(self, Self::Data)
    }
}

/// A decoded frame.
///
/// For DATA frames `sequence` is N(S). For ACK and NACK it is N(R), the
/// next sequence the sender of the frame expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub kind: FrameKind,
    pub sequence: Sequence,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn data(sequence: Sequence, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            address: BROADCAST_ADDRESS,
            kind: FrameKind::Data,
            sequence,
            payload: payload.into(),
        }
    }

    pub fn ack(next_expected: Sequence) -> Self {
        Self {
            address: BROADCAST_ADDRESS,
            kind: FrameKind::Ack,
            sequence: next_expected,
            payload: Vec::new(),
        }
    }

    pub fn nack(next_expected: Sequence) -> Self {
        Self {
            address: BROADCAST_ADDRESS,
            kind: FrameKind::Nack,
            sequence: next_expected,
            payload: Vec::new(),
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Parses an unstuffed body whose FCS has already been verified.
    pub fn from_body(body: &[u8]) -> Result<Self, FrameError> {
        if body.len() < FRAME_OVERHEAD {
            return Err(FrameError::MalformedFrame(Malformed::TooShort));
        }

        let (kind, sequence) = decode_control(body[1])?;
        let payload = &body[2..body.len() - FCS_SIZE];

        if !kind.has_payload() && !payload.is_empty() {
            return Err(FrameError::MalformedFrame(Malformed::SupervisoryPayload));
        }

        Ok(Self {
            address: body[0],
            kind,
            sequence,
            payload: payload.to_vec(),
        })
    }

    /// True when a station at `local` should accept this frame.
    pub fn is_addressed_to(&self, local: u8) -> bool {
        accepts_address(self.address, local)
    }
}

/// True when a station at `local` accepts frames sent to `address`.
pub const fn accepts_address(address: u8, local: u8) -> bool {
    address == local || address == BROADCAST_ADDRESS || local == BROADCAST_ADDRESS
}

/// True for the control byte layout DATA frames are sent with.
pub const fn is_data_control(control: u8) -> bool {
    control & !(0x7 << CONTROL_SEND_SEQ_BIT) == 1 << CONTROL_POLL_BIT
}

/// Builds the control byte for a frame.
pub const fn encode_control(kind: FrameKind, sequence: Sequence) -> u8 {
    let seq = sequence.value();
    match kind {
        FrameKind::Data => (seq << CONTROL_SEND_SEQ_BIT) | (1 << CONTROL_POLL_BIT),
        FrameKind::Ack => {
            (seq << CONTROL_RECV_SEQ_BIT)
                | (S_TYPE_RECEIVE_READY << CONTROL_S_TYPE_BIT)
                | (1 << CONTROL_S_FRAME_BIT)
        }
        FrameKind::Nack => {
            (seq << CONTROL_RECV_SEQ_BIT)
                | (S_TYPE_REJECT << CONTROL_S_TYPE_BIT)
                | (1 << CONTROL_S_FRAME_BIT)
        }
    }
}

/// Splits a control byte into frame kind and sequence.
///
/// Receive Not Ready and Selective Reject are treated as NACK. U-frames
/// are not supported.
pub fn decode_control(control: u8) -> Result<(FrameKind, Sequence), FrameError> {
    if (control >> CONTROL_S_FRAME_BIT) & 0x1 == 0 {
        let sequence = Sequence::new((control >> CONTROL_SEND_SEQ_BIT) & 0x7);
        return Ok((FrameKind::Data, sequence));
    }

    if (control >> CONTROL_SEND_SEQ_BIT) & 0x1 != 0 {
        return Err(FrameError::MalformedFrame(Malformed::UnsupportedControl));
    }

    let sequence = Sequence::new((control >> CONTROL_RECV_SEQ_BIT) & 0x7);
    let kind = if (control >> CONTROL_S_TYPE_BIT) & 0x3 == S_TYPE_RECEIVE_READY {
        FrameKind::Ack
    } else {
        FrameKind::Nack
    };

    Ok((kind, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_bytes() {
        assert_eq!(encode_control(FrameKind::Data, Sequence::new(1)), 0x12);
        assert_eq!(encode_control(FrameKind::Ack, Sequence::new(2)), 0x41);
        assert_eq!(encode_control(FrameKind::Ack, Sequence::new(1)), 0x21);
        assert_eq!(encode_control(FrameKind::Nack, Sequence::new(1)), 0x29);
    }

    #[test]
    fn test_control_roundtrip() {
        for kind in [FrameKind::Data, FrameKind::Ack, FrameKind::Nack] {
            for seq in 0..8 {
                let control = encode_control(kind, Sequence::new(seq));
                assert_eq!(decode_control(control), Ok((kind, Sequence::new(seq))));
            }
        }
    }

    #[test]
    fn test_data_control_shape() {
        for seq in 0..8 {
            assert!(is_data_control(encode_control(FrameKind::Data, Sequence::new(seq))));
            assert!(!is_data_control(encode_control(FrameKind::Ack, Sequence::new(seq))));
            assert!(!is_data_control(encode_control(FrameKind::Nack, Sequence::new(seq))));
        }
        // I-frame without the poll bit, and one with N(R) bits set.
        assert!(!is_data_control(0x02));
        assert!(!is_data_control(0x32));
    }

    #[test]
    fn test_address_acceptance() {
        assert!(accepts_address(0x03, 0x03));
        assert!(accepts_address(BROADCAST_ADDRESS, 0x03));
        assert!(accepts_address(0x05, BROADCAST_ADDRESS));
        assert!(!accepts_address(0x05, 0x03));
    }

    #[test]
    fn test_other_supervisory_types_are_nack() {
        // Receive Not Ready, N(R) = 3
        assert_eq!(
            decode_control(0x65),
            Ok((FrameKind::Nack, Sequence::new(3)))
        );
    }

    #[test]
    fn test_u_frame_rejected() {
        assert_eq!(
            decode_control(0x03),
            Err(FrameError::MalformedFrame(Malformed::UnsupportedControl))
        );
    }

    #[test]
    fn test_supervisory_with_payload_rejected() {
        let body = [0xFF, 0x41, 0x00, 0x00, 0x00];
        assert_eq!(
            Frame::from_body(&body),
            Err(FrameError::MalformedFrame(Malformed::SupervisoryPayload))
        );
    }

    #[test]
    fn test_addressing() {
        let frame = Frame::data(Sequence::FIRST, &b"x"[..]).with_address(0x03);
        assert!(frame.is_addressed_to(0x03));
        assert!(frame.is_addressed_to(BROADCAST_ADDRESS));
        assert!(!frame.is_addressed_to(0x04));
        assert!(Frame::ack(Sequence::FIRST).is_addressed_to(0x04));
    }
}
