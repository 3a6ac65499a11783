//! Byte buffer support for the codec.
//!
//! Writing goes through [`bytes::BufMut`] on a [`bytes::BytesMut`];
//! reference counting and zero-copy slicing are provided by
//! [`bytes::Bytes`] (clone retains, drop releases). This module adds the
//! bounds-checked read cursor the decoder walks and the composite
//! accumulator used to reassemble multi-transfer delivery payloads
//! without copying until the delivery completes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;

/// A read cursor over a byte slice.
///
/// All multi-byte reads are big-endian. Reading past the end of the
/// slice fails with [`Error::IndexOutOfRange`] instead of panicking.
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether the cursor has reached the end.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Current read index.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the next byte without advancing.
    pub fn peek(&self) -> Result<u8, Error> {
        self.bytes.get(self.pos).copied().ok_or(Error::IndexOutOfRange)
    }

    /// Advances the cursor by `n` bytes.
    pub fn advance(&mut self, n: usize) -> Result<(), Error> {
        if self.remaining() < n {
            return Err(Error::IndexOutOfRange);
        }
        self.pos += n;
        Ok(())
    }

    /// Reads `n` bytes as a sub-slice of the underlying storage.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(Error::IndexOutOfRange);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    /// Reads one signed byte.
    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian i16.
    pub fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian i32.
    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian u64.
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian i64.
    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian f32.
    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian f64.
    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }
}

/// Logical concatenation of payload slices.
///
/// Each inbound transfer's payload slice is retained here (a cheap
/// `Bytes` clone of the frame body) until the delivery completes, at
/// which point [`Composite::freeze`] produces the contiguous payload.
#[derive(Debug, Default)]
pub struct Composite {
    chunks: Vec<Bytes>,
    len: usize,
}

impl Composite {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a payload slice without copying.
    pub fn push(&mut self, chunk: Bytes) {
        self.len += chunk.len();
        self.chunks.push(chunk);
    }

    /// Total accumulated length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of retained slices.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Produces the contiguous payload, copying only when the payload
    /// spans more than one slice.
    pub fn freeze(mut self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks.pop().unwrap_or_default(),
            _ => {
                let mut buf = BytesMut::with_capacity(self.len);
                for chunk in &self.chunks {
                    buf.put_slice(chunk);
                }
                buf.freeze()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_past_end_fails() {
        let mut reader = ByteReader::new(&[0x01, 0x02]);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.read_u8(), Err(Error::IndexOutOfRange));
    }

    #[test]
    fn reads_are_big_endian() {
        let mut reader = ByteReader::new(&[0x00, 0x00, 0x01, 0x00]);
        assert_eq!(reader.read_u32().unwrap(), 256);
    }

    #[test]
    fn composite_concatenates_in_order() {
        let mut payload = Composite::new();
        payload.push(Bytes::from_static(b"AAAAA"));
        payload.push(Bytes::from_static(b"BBBBB"));
        payload.push(Bytes::from_static(b"CCCCC"));
        assert_eq!(payload.len(), 15);
        assert_eq!(payload.freeze().as_ref(), b"AAAAABBBBBCCCCC");
    }

    #[test]
    fn composite_single_chunk_does_not_copy() {
        let chunk = Bytes::from_static(b"hello");
        let mut payload = Composite::new();
        payload.push(chunk.clone());
        let frozen = payload.freeze();
        assert_eq!(frozen, chunk);
    }
}
