//! Stream capability block.
//!
//! An opaque descriptor of audio/video codec parameters, produced by the
//! index generator and carried verbatim in the seek index. The engine
//! round-trips the block; it never looks inside.

use bytes::Bytes;

/// Opaque codec capability descriptor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamCapabilities {
    raw: Bytes,
}

impl StreamCapabilities {
    pub fn from_bytes(raw: impl Into<Bytes>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Append the length-prefixed block to `out`
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.raw.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.raw);
    }
}
