//! Byte cursor over a JPI download stream.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use zerocopy::big_endian::U16;

use crate::Error;

/// A byte-oriented cursor with a running counter and current-record capture.
///
/// Every byte delivered through [`read_u8`](Self::read_u8) is appended to the
/// current record buffer, which feeds both the trailing-sum checksum and
/// diagnostic dumps. [`peek`](Self::peek) and [`skip`](Self::skip)
/// deliberately bypass that buffer: peeked bytes have not been consumed, and
/// skipped regions lie outside any record.
pub struct JpiStream<R> {
    inner: R,
    lookahead: VecDeque<u8>,
    counter: usize,
    record: Vec<u8>,
}

impl<R: Read> JpiStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            lookahead: VecDeque::new(),
            counter: 0,
            record: Vec::new(),
        }
    }

    fn next_byte(&mut self) -> Result<u8, Error> {
        if let Some(byte) = self.lookahead.pop_front() {
            return Ok(byte);
        }
        let mut buf = [0; 1];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => Ok(buf[0]),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::UnexpectedEof),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Read one byte, advancing the counter and the current record.
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let byte = self.next_byte()?;
        self.counter += 1;
        self.record.push(byte);
        Ok(byte)
    }

    /// Read a big-endian 16-bit word.
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        let bytes = [self.read_u8()?, self.read_u8()?];
        Ok(U16::from_bytes(bytes).get())
    }

    /// Look at the next `N` bytes without consuming them.
    pub fn peek<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        while self.lookahead.len() < N {
            let mut buf = [0; 1];
            match self.inner.read_exact(&mut buf) {
                Ok(()) => self.lookahead.push_back(buf[0]),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Err(Error::UnexpectedEof);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        let mut result = [0; N];
        for (slot, byte) in result.iter_mut().zip(self.lookahead.iter()) {
            *slot = *byte;
        }
        Ok(result)
    }

    /// Discard `num_bytes` bytes, advancing the counter but not the current
    /// record.
    pub fn skip(&mut self, num_bytes: usize) -> Result<(), Error> {
        self.counter += num_bytes;
        for _ in 0..num_bytes {
            self.next_byte()?;
        }
        Ok(())
    }

    /// Drain the source, returning the number of bytes consumed.
    pub fn skip_to_end(&mut self) -> Result<usize, Error> {
        let mut length = self.lookahead.len();
        self.lookahead.clear();
        let mut sink = Vec::new();
        length += self.inner.read_to_end(&mut sink).map_err(Error::Io)?;
        Ok(length)
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn reset_counter(&mut self) {
        self.counter = 0;
    }

    pub fn clear_record(&mut self) {
        self.record.clear();
    }

    pub fn record_len(&self) -> usize {
        self.record.len()
    }

    /// The captured record bytes, in read order.
    pub fn record_bytes(&self) -> &[u8] {
        &self.record
    }

    /// The captured record bytes as uppercase hex, space-separated.
    pub fn record_hex(&self) -> String {
        let bytes: Vec<String> = self.record.iter().map(|b| format!("{b:02X}")).collect();
        bytes.join(" ")
    }

    /// Read the trailing checksum byte and verify that it brings the sum of
    /// the captured record bytes to zero mod 256. Returns a warning message
    /// on mismatch.
    pub fn checksum_epilogue(&mut self) -> Result<Option<String>, Error> {
        let actual = self.read_u8()?;
        // TODO: firmware < 3.00 reportedly XORs instead of summing.
        // Implement once a sample file is available.
        let sum = self
            .record
            .iter()
            .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
        let residue = sum.wrapping_neg();
        if residue != 0 {
            Ok(Some(format!(
                "Checksum mismatch actual {:02X} vs expected {:02X}: [{}]",
                actual,
                actual.wrapping_add(residue),
                self.record_hex()
            )))
        } else {
            Ok(None)
        }
    }
}
