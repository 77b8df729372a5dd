//! Seek index writer.
//!
//! Persists a generator-produced [`IndexDocument`] in the binary layout
//! the reader expects: bucket table entries point at the last frame at or
//! before the bucket's timestamp, so a lookup always lands at or before
//! the requested time.

use std::path::Path;

use crate::capabilities::StreamCapabilities;
use crate::error::{Result, StreamError};
use crate::index::frame::FrameDescriptor;

/// Everything the index generator hands back for one source file
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub capabilities: StreamCapabilities,
    pub frames: Vec<FrameDescriptor>,
    /// Milliseconds per lookup-table bucket
    pub sampling_rate_ms: u32,
}

/// Serialize `doc` to `path`
pub fn write_index(path: &Path, doc: &IndexDocument) -> Result<()> {
    if doc.sampling_rate_ms == 0 {
        return Err(StreamError::IndexCorrupt(
            "index document has zero sampling rate".into(),
        ));
    }
    for pair in doc.frames.windows(2) {
        if pair[1].time_ms < pair[0].time_ms {
            return Err(StreamError::IndexCorrupt(format!(
                "descriptor timestamps decrease: {}ms after {}ms",
                pair[1].time_ms, pair[0].time_ms
            )));
        }
    }

    let mut out = Vec::new();
    doc.capabilities.serialize_into(&mut out);

    out.extend_from_slice(&(doc.frames.len() as u32).to_le_bytes());
    for frame in &doc.frames {
        frame.encode_into(&mut out);
    }

    out.extend_from_slice(&doc.sampling_rate_ms.to_le_bytes());

    let rate = doc.sampling_rate_ms as u64;
    let last_time = doc.frames.last().map(|f| f.time_ms).unwrap_or(0);
    let buckets = last_time / rate + 1;
    let mut at_or_before = 0u32;
    for bucket in 0..buckets {
        let bucket_time = bucket * rate;
        while (at_or_before + 1) < doc.frames.len() as u32
            && doc.frames[at_or_before as usize + 1].time_ms <= bucket_time
        {
            at_or_before += 1;
        }
        out.extend_from_slice(&at_or_before.to_le_bytes());
    }

    let max_frame_size = doc.frames.iter().map(|f| f.length as u64).max().unwrap_or(0);
    out.extend_from_slice(&max_frame_size.to_le_bytes());

    std::fs::write(path, &out)?;
    tracing::info!(
        path = %path.display(),
        frames = doc.frames.len(),
        buckets,
        "wrote seek index"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessMode;
    use crate::index::SeekIndex;
    use crate::tests::fixtures::video;

    #[test]
    fn test_write_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rt.seek");
        let doc = IndexDocument {
            capabilities: StreamCapabilities::from_bytes(vec![9u8; 33]),
            frames: vec![video(0, 10, 0), video(500, 250, 10), video(1000, 25, 260)],
            sampling_rate_ms: 250,
        };
        write_index(&path, &doc).unwrap();

        let mut index = SeekIndex::open(&path, &path, AccessMode::Shared).unwrap();
        assert_eq!(index.frame_count(), 3);
        assert_eq!(index.max_frame_size(), 250);
        assert_eq!(index.capabilities(), &doc.capabilities);
        assert_eq!(index.sampling_rate().unwrap(), 250);
        for (i, want) in doc.frames.iter().enumerate() {
            assert_eq!(&index.frame(i as u32).unwrap(), want);
        }
        index.validate().unwrap();
    }

    #[test]
    fn test_decreasing_timestamps_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.seek");
        let doc = IndexDocument {
            capabilities: StreamCapabilities::default(),
            frames: vec![video(100, 1, 0), video(50, 1, 1)],
            sampling_rate_ms: 1000,
        };
        assert!(matches!(
            write_index(&path, &doc),
            Err(StreamError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.seek");
        let doc = IndexDocument {
            capabilities: StreamCapabilities::default(),
            frames: Vec::new(),
            sampling_rate_ms: 1000,
        };
        write_index(&path, &doc).unwrap();
        let mut index = SeekIndex::open(&path, &path, AccessMode::Shared).unwrap();
        assert_eq!(index.frame_count(), 0);
        assert_eq!(index.max_frame_size(), 0);
        assert!(index.frame(0).is_err());
    }
}
