//! Shared, immutable byte storage with a base offset.

use std::sync::Arc;

use crate::error::{DecodeError, DecodeResult};

/// An immutable window onto shared bytes.
///
/// Cloning is cheap: every clone and every sub-view shares the same
/// allocation. The bytes are never mutated after construction.
#[derive(Debug, Clone)]
pub struct BinaryBuffer {
    data: Arc<[u8]>,
    byte_offset: usize,
    byte_length: usize,
}

impl BinaryBuffer {
    /// Wrap the whole of `data`.
    #[must_use]
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let byte_length = data.len();
        Self {
            data,
            byte_offset: 0,
            byte_length,
        }
    }

    /// A buffer with no bytes.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::<u8>::new())
    }

    /// Create a window of `byte_length` bytes starting at `byte_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedBuffer`] if the window extends past the
    /// end of `data`.
    pub fn with_range(
        data: impl Into<Arc<[u8]>>,
        byte_offset: usize,
        byte_length: usize,
    ) -> DecodeResult<Self> {
        Self::new(data).slice(byte_offset, byte_length)
    }

    /// Create a sub-view relative to this buffer's own offset.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedBuffer`] if the sub-view extends past
    /// the end of this buffer.
    pub fn slice(&self, byte_offset: usize, byte_length: usize) -> DecodeResult<Self> {
        let available = self.byte_length.saturating_sub(byte_offset);
        if byte_offset > self.byte_length || byte_length > available {
            return Err(DecodeError::TruncatedBuffer {
                context: "binary buffer",
                expected: byte_length,
                actual: available,
            });
        }

        Ok(Self {
            data: Arc::clone(&self.data),
            byte_offset: self.byte_offset + byte_offset,
            byte_length,
        })
    }

    /// Offset of this view within the shared allocation.
    #[must_use]
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    #[must_use]
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.byte_length == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.byte_offset..self.byte_offset + self.byte_length]
    }
}

impl Default for BinaryBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for BinaryBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for BinaryBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_buffer() {
        let buffer = BinaryBuffer::new(vec![1u8, 2, 3, 4]);
        assert_eq!(buffer.byte_offset(), 0);
        assert_eq!(buffer.byte_length(), 4);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_nested_slices_accumulate_offset() {
        let buffer = BinaryBuffer::with_range(vec![0u8, 1, 2, 3, 4, 5, 6, 7], 2, 5).unwrap();
        assert_eq!(buffer.as_slice(), &[2, 3, 4, 5, 6]);

        let inner = buffer.slice(1, 3).unwrap();
        assert_eq!(inner.byte_offset(), 3);
        assert_eq!(inner.as_slice(), &[3, 4, 5]);
    }

    #[test]
    fn test_slice_past_end() {
        let buffer = BinaryBuffer::new(vec![0u8; 4]);
        assert!(matches!(
            buffer.slice(2, 3),
            Err(DecodeError::TruncatedBuffer {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_empty() {
        let buffer = BinaryBuffer::empty();
        assert!(buffer.is_empty());
        assert!(buffer.as_slice().is_empty());
    }
}
