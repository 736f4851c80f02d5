//! Bounds-checked little-endian field reader.
//!
//! SRR block headers and SRS metadata records are packed little-endian
//! structs. [`FieldReader`] walks such a record and reports a truncated
//! record as [`Error::UnexpectedEof`] instead of panicking.

use crate::{Error, Result};
use bytes::Buf;

/// Cursor over a little-endian record.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> FieldReader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            len: buf.len(),
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.len - self.buf.len()
    }

    /// Bytes left in the record.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::UnexpectedEof {
                needed: self.position() + n,
                have: self.len,
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    /// Borrow the next `n` bytes.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Read `n` bytes as a string, replacing invalid UTF-8.
    pub fn string(&mut self, n: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.bytes(n)?).into_owned())
    }

    /// Read a `u16` length prefix followed by that many string bytes.
    pub fn prefixed_string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        self.string(len)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.need(n)?;
        self.buf.advance(n);
        Ok(())
    }
}
