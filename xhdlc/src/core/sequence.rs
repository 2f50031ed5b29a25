//! Modulo-8 sequence numbers carried in the 3-bit N(S)/N(R) control fields.

use core::fmt;

/// Size of the sequence space.
pub const SEQUENCE_MODULUS: u8 = 8;

/// A sequence number in `0..SEQUENCE_MODULUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sequence(u8);

impl Sequence {
    /// Sequence carried by the first DATA frame of a session.
    pub const FIRST: Self = Self(1);

    /// Wraps any value into the sequence space.
    #[inline]
    pub const fn new(value: u8) -> Self {
        Self(value % SEQUENCE_MODULUS)
    }

    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn next(self) -> Self {
        Self::new(self.0 + 1)
    }

    #[inline]
    pub const fn prev(self) -> Self {
        Self::new(self.0 + SEQUENCE_MODULUS - 1)
    }
}

impl From<Sequence> for u8 {
    fn from(seq: Sequence) -> u8 {
        seq.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
