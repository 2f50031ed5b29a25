//! FCS-16 frame check sequence (CRC-16/X.25, RFC 1662).
//!
//! Both peers must use this exact algorithm; it is not negotiated.
//!
//! # Example
//!
//! ```rust
//! use xhdlc::Fcs16;
//!
//! let fcs = Fcs16::compute(b"123456789");
//! assert_eq!(fcs, 0x906E);
//! ```

/// FCS-16 polynomial x^16 + x^12 + x^5 + 1, bit-reversed.
const FCS16_POLYNOMIAL: u16 = 0x8408;

/// Initial register value.
pub const FCS16_INIT: u16 = 0xFFFF;

/// Register value left after running the FCS over a body that ends with
/// its own (inverted, little-endian) FCS.
pub const FCS16_GOOD: u16 = 0xF0B8;

/// Size of the FCS on the wire.
pub const FCS_SIZE: usize = 2;

const FCS16_TABLE: [u16; 256] = generate_fcs16_table();

/// Generates the lookup table at compile time.
const fn generate_fcs16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut fcs = i as u16;
        let mut j = 0;

        while j < 8 {
            if fcs & 1 != 0 {
                fcs = (fcs >> 1) ^ FCS16_POLYNOMIAL;
            } else {
                fcs >>= 1;
            }
            j += 1;
        }

        table[i] = fcs;
        i += 1;
    }

    table
}

/// Incremental FCS-16 calculator.
#[derive(Debug, Clone, Copy)]
pub struct Fcs16 {
    state: u16,
}

impl Default for Fcs16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Fcs16 {
    #[inline]
    pub const fn new() -> Self {
        Self { state: FCS16_INIT }
    }

    /// Feeds a single byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        let index = ((self.state ^ u16::from(byte)) & 0xFF) as usize;
        self.state = (self.state >> 8) ^ FCS16_TABLE[index];
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.push(byte);
        }
    }

    /// Returns the value to transmit (register inverted).
    #[inline]
    pub const fn finalize(self) -> u16 {
        self.state ^ 0xFFFF
    }

    /// True once the register holds the good-frame residue.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.state == FCS16_GOOD
    }

    #[inline]
    pub fn compute(data: &[u8]) -> u16 {
        let mut fcs = Self::new();
        fcs.update(data);
        fcs.finalize()
    }

    /// Verifies a body whose last two bytes are the little-endian FCS.
    #[inline]
    pub fn verify_trailing(body: &[u8]) -> bool {
        if body.len() < FCS_SIZE {
            return false;
        }
        let mut fcs = Self::new();
        fcs.update(body);
        fcs.is_good()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_value() {
        assert_eq!(Fcs16::compute(b"123456789"), 0x906E);
    }

    #[test]
    fn test_empty_data() {
        assert_eq!(Fcs16::compute(&[]), 0x0000);
    }

    #[test]
    fn test_incremental() {
        let full = Fcs16::compute(b"Hello, World!");

        let mut fcs = Fcs16::new();
        fcs.update(b"Hello, ");
        fcs.update(b"World!");
        assert_eq!(fcs.finalize(), full);
    }

    #[test]
    fn test_good_residue() {
        let body = [0xFF, 0x12, 0x55];
        let fcs = Fcs16::compute(&body).to_le_bytes();
        assert_eq!(fcs, [0x36, 0xA3]);

        let framed = [0xFF, 0x12, 0x55, fcs[0], fcs[1]];
        assert!(Fcs16::verify_trailing(&framed));
    }

    #[test]
    fn test_detects_single_bit_errors() {
        let mut body = [0xFF, 0x16, b'h', b'e', b'l', b'l', b'o', 0, 0];
        let fcs = Fcs16::compute(&body[..7]).to_le_bytes();
        body[7] = fcs[0];
        body[8] = fcs[1];

        for byte in 0..body.len() {
            for bit in 0..8 {
                let mut corrupted = body;
                corrupted[byte] ^= 1 << bit;
                assert!(!Fcs16::verify_trailing(&corrupted), "byte {byte} bit {bit}");
            }
        }
    }
}
