//! Fixed-width bit masks with byte-addressed construction.

use core::fmt;

/// A mutable bit mask backed by a fixed number of bytes.
///
/// Byte 0 holds the lowest-order bits, and within each byte, bit 0 is the
/// lowest-order bit, so overall bit `b` lives at byte `b / 8`, bit `b % 8`.
/// Out-of-range indices are a caller bug and panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitArray {
    bytes: Vec<u8>,
}

impl BitArray {
    /// Create a cleared mask over `num_bytes` bytes.
    pub fn new(num_bytes: usize) -> Self {
        Self {
            bytes: vec![0; num_bytes],
        }
    }

    /// Clear every bit.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    pub fn num_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn num_bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Store a full byte. Index 0 contains the lowest-order bits.
    pub fn set_byte(&mut self, index: usize, value: u8) {
        self.bytes[index] = value;
    }

    /// Store a 16-bit word with its lowest-order byte at `index`.
    pub fn set_word(&mut self, index: usize, value: u16) {
        self.bytes[index] = (value & 0xFF) as u8;
        self.bytes[index + 1] = (value >> 8) as u8;
    }

    pub fn test_bit(&self, bit: usize) -> bool {
        self.bytes[bit / 8] & (1 << (bit % 8)) != 0
    }

    pub fn set_bit(&mut self, bit: usize) {
        self.bytes[bit / 8] |= 1 << (bit % 8);
    }

    pub fn clear_bit(&mut self, bit: usize) {
        self.bytes[bit / 8] &= !(1 << (bit % 8));
    }

    /// Extract bits `start..=end` in the historical EDM tooling order:
    /// accumulate from the high end, shifting after each bit. The result is
    /// the little-endian reading of the range, doubled.
    pub fn extract_bits(&self, start: usize, end: usize) -> u32 {
        let mut result = 0;
        for bit in (start..=end).rev() {
            result |= u32::from(self.test_bit(bit));
            result <<= 1;
        }
        result
    }

    /// Count the set bits in `start..=end`.
    pub fn count_bits(&self, start: usize, end: usize) -> u32 {
        (start..=end).filter(|&bit| self.test_bit(bit)).count() as u32
    }
}

/// Bytes from highest-order to lowest, each as eight binary digits.
impl fmt::Display for BitArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:08b}")?;
        }
        Ok(())
    }
}
