//! Frame layer: wire format, byte stuffing and integrity check.
//!
//! - [`Frame`]: decoded address, control and payload
//! - [`Encoder`] / [`Decoder`]: flag delimiting and byte stuffing
//! - [`Fcs16`]: frame check sequence
//! - [`Sequence`]: modulo-8 sequence numbers

mod codec;
mod fcs;
mod frame;
mod sequence;

pub use codec::{
    Decoded, Decoder, Encoder, FrameError, Malformed, SUPERVISORY_FRAME_MAX, SupervisoryFrame,
};
pub use fcs::{FCS_SIZE, FCS16_GOOD, FCS16_INIT, Fcs16};
pub use frame::{
    BROADCAST_ADDRESS, ESCAPE, ESCAPE_XOR, FLAG, FRAME_OVERHEAD, Frame, FrameKind,
    accepts_address, decode_control, encode_control, is_data_control,
};
pub use sequence::{SEQUENCE_MODULUS, Sequence};
