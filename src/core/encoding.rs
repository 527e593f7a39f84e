//! Binary wire primitives
//!
//! Little-endian integers and compact-size prefixed byte strings, written
//! into a `BytesMut` and read back through a bounds-checked reader. The
//! reader never panics on short input and rejects non-canonical length
//! prefixes, so decoding followed by encoding reproduces the input exactly.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Wire decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("Non-canonical length prefix")]
    NonCanonicalLength,
    #[error("Length prefix {0} exceeds available data")]
    LengthTooLarge(u64),
    #[error("{0} trailing bytes after end of data")]
    TrailingBytes(usize),
}

/// Write a compact-size unsigned integer
pub fn put_var_uint(buf: &mut BytesMut, value: u64) {
    match value {
        0..=0xFC => buf.put_u8(value as u8),
        0xFD..=0xFFFF => {
            buf.put_u8(0xFD);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.put_u8(0xFE);
            buf.put_u32_le(value as u32);
        }
        _ => {
            buf.put_u8(0xFF);
            buf.put_u64_le(value);
        }
    }
}

/// Write a length-prefixed byte string
pub fn put_var_bytes(buf: &mut BytesMut, data: &[u8]) {
    put_var_uint(buf, data.len() as u64);
    buf.put_slice(data);
}

/// Bounds-checked reader over a byte slice
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn u16_le(&mut self) -> Result<u16, DecodeError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn u32_le(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn u64_le(&mut self) -> Result<u64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn i64_le(&mut self) -> Result<i64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Read a compact-size integer, rejecting encodings longer than needed
    pub fn var_uint(&mut self) -> Result<u64, DecodeError> {
        let (value, minimum) = match self.u8()? {
            0xFD => (self.u16_le()? as u64, 0xFD),
            0xFE => (self.u32_le()? as u64, 0x1_0000),
            0xFF => (self.u64_le()?, 0x1_0000_0000),
            small => return Ok(small as u64),
        };
        if value < minimum {
            return Err(DecodeError::NonCanonicalLength);
        }
        Ok(value)
    }

    /// Read an element count, bounded by the bytes left to decode
    ///
    /// `min_item_size` is the smallest encoding of one element, which keeps
    /// a hostile count from triggering a huge allocation.
    pub fn count(&mut self, min_item_size: usize) -> Result<usize, DecodeError> {
        let count = self.var_uint()?;
        let max = (self.remaining() / min_item_size.max(1)) as u64;
        if count > max {
            return Err(DecodeError::LengthTooLarge(count));
        }
        Ok(count as usize)
    }

    pub fn var_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.var_uint()?;
        if len > self.remaining() as u64 {
            return Err(DecodeError::LengthTooLarge(len));
        }
        let len = len as usize;
        let out = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(out)
    }

    /// Require that every byte has been consumed
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(DecodeError::TrailingBytes(extra)),
        }
    }
}
