//! Little-endian byte cursor primitives.
//!
//! All raw integer and string encoding in the container format goes
//! through [`Cursor`] (reads) and [`Writer`] (writes). Both operate on
//! in-memory buffers; file I/O stays at the crate boundary.

use byteorder::{ByteOrder, LittleEndian};

use crate::util::{Error, Result};

/// Bounds-checked read cursor over a byte slice.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes remaining after the current position.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(Error::format(format!(
                "seek to {} past end of {}-byte buffer",
                pos,
                self.buf.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::format(format!(
                "unexpected end of data at {} (wanted {} bytes, {} left)",
                self.pos,
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }
}

/// Growable little-endian output buffer.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write position (== bytes written so far).
    #[inline]
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Overwrite a u32 previously written at `pos`. Used for offset
    /// fields that are only known after later sections are laid out.
    pub fn patch_u32(&mut self, pos: usize, value: u32) {
        self.buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reads() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0xff];
        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_u32().unwrap(), 0x04030201);
        assert_eq!(c.read_u8().unwrap(), 0xff);
        assert!(c.is_empty());
        assert!(c.read_u8().is_err());
    }

    #[test]
    fn test_writer_patch() {
        let mut w = Writer::new();
        w.write_u32(0);
        w.write_u16(7);
        w.patch_u32(0, 0xaabbccdd);
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..4], &0xaabbccddu32.to_le_bytes());
        assert_eq!(&bytes[4..], &7u16.to_le_bytes());
    }

    #[test]
    fn test_truncated_read_is_format_error() {
        let mut c = Cursor::new(&[0x01]);
        let err = c.read_u32().unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
