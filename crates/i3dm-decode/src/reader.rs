//! Little-endian cursor over a byte slice.

use crate::error::{DecodeError, DecodeResult};

/// Sequential reader of little-endian fields.
///
/// Every read checks the remaining length first, so a short buffer surfaces
/// as [`DecodeError::TruncatedBuffer`] instead of a panic.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Take the next `len` bytes as a sub-slice.
    pub(crate) fn take(&mut self, len: usize, context: &'static str) -> DecodeResult<&'a [u8]> {
        let available = self.data.len().saturating_sub(self.offset);
        if len > available {
            return Err(DecodeError::TruncatedBuffer {
                context,
                expected: len,
                actual: available,
            });
        }

        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, context: &'static str) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, context)?);
        Ok(out)
    }

    pub(crate) fn read_magic(&mut self, context: &'static str) -> DecodeResult<[u8; 4]> {
        self.take_array(context)
    }

    pub(crate) fn read_u8(&mut self, context: &'static str) -> DecodeResult<u8> {
        Ok(self.take_array::<1>(context)?[0])
    }

    pub(crate) fn read_u16(&mut self, context: &'static str) -> DecodeResult<u16> {
        self.take_array(context).map(u16::from_le_bytes)
    }

    pub(crate) fn read_u32(&mut self, context: &'static str) -> DecodeResult<u32> {
        self.take_array(context).map(u32::from_le_bytes)
    }

    pub(crate) fn read_f64(&mut self, context: &'static str) -> DecodeResult<f64> {
        self.take_array(context).map(f64::from_le_bytes)
    }
}
