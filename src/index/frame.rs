//! Frame descriptors.
//!
//! One descriptor per access unit, stored contiguously in the seek index
//! with a fixed 22-byte little-endian encoding so frame `i` is addressable
//! at `frames_base + i * ENCODED_LEN`.

use crate::error::{Result, StreamError};

/// Kind of access unit a descriptor points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Audio,
    Video,
    /// Metadata-only record, routed to the metadata sink and never counted
    /// as media progress
    Data,
}

impl FrameKind {
    fn to_wire(self) -> u8 {
        match self {
            FrameKind::Audio => 1,
            FrameKind::Video => 2,
            FrameKind::Data => 3,
        }
    }

    fn from_wire(raw: u8) -> Result<FrameKind> {
        match raw {
            1 => Ok(FrameKind::Audio),
            2 => Ok(FrameKind::Video),
            3 => Ok(FrameKind::Data),
            other => Err(StreamError::IndexCorrupt(format!(
                "unknown frame kind tag {}",
                other
            ))),
        }
    }
}

/// Descriptor of a single access unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Presentation timestamp in milliseconds
    pub time_ms: u64,
    pub kind: FrameKind,
    /// Codec-configuration blob rather than normal payload
    pub is_binary_header: bool,
    /// Payload byte count in the raw media file
    pub length: u32,
    /// Payload byte offset in the raw media file
    pub media_offset: u64,
}

impl FrameDescriptor {
    /// On-disk size: u64 time + u8 kind + u8 flags + u32 length + u64 offset
    pub const ENCODED_LEN: usize = 22;

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.time_ms.to_le_bytes());
        out.push(self.kind.to_wire());
        out.push(self.is_binary_header as u8);
        out.extend_from_slice(&self.length.to_le_bytes());
        out.extend_from_slice(&self.media_offset.to_le_bytes());
    }

    pub fn decode(raw: &[u8; Self::ENCODED_LEN]) -> Result<FrameDescriptor> {
        let kind = FrameKind::from_wire(raw[8])?;
        let flags = raw[9];
        if flags > 1 {
            return Err(StreamError::IndexCorrupt(format!(
                "unknown frame flags {:#04x}",
                flags
            )));
        }
        Ok(FrameDescriptor {
            time_ms: u64::from_le_bytes(raw[0..8].try_into().unwrap()),
            kind,
            is_binary_header: flags == 1,
            length: u32::from_le_bytes(raw[10..14].try_into().unwrap()),
            media_offset: u64::from_le_bytes(raw[14..22].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_round_trip() {
        let frame = FrameDescriptor {
            time_ms: 123_456_789,
            kind: FrameKind::Video,
            is_binary_header: true,
            length: 4096,
            media_offset: u64::MAX / 3,
        };
        let mut out = Vec::new();
        frame.encode_into(&mut out);
        assert_eq!(out.len(), FrameDescriptor::ENCODED_LEN);

        let raw: [u8; FrameDescriptor::ENCODED_LEN] = out.try_into().unwrap();
        assert_eq!(FrameDescriptor::decode(&raw).unwrap(), frame);
    }

    #[test]
    fn test_bad_kind_tag_rejected() {
        let mut raw = [0u8; FrameDescriptor::ENCODED_LEN];
        raw[8] = 7;
        assert!(matches!(
            FrameDescriptor::decode(&raw),
            Err(StreamError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_bad_flags_rejected() {
        let mut raw = [0u8; FrameDescriptor::ENCODED_LEN];
        raw[8] = 1;
        raw[9] = 0xff;
        assert!(FrameDescriptor::decode(&raw).is_err());
    }
}
