//! Binary seek index.
//!
//! Layout (little-endian):
//!
//! ```text
//! [cap_len: u32][capability block]
//! [frame_count: u32][FrameDescriptor * frame_count]
//! [sampling_rate_ms: u32][u32 bucket table]
//! [max_frame_size: u64]
//! ```
//!
//! The index keeps all metadata (capabilities, descriptors, ms lookup
//! table) apart from the raw payload bytes, so random seeking never parses
//! the original container at serve time. `max_frame_size` sizes the media
//! read window and is never used for correctness.

mod frame;
mod writer;

pub use frame::{FrameDescriptor, FrameKind};
pub use writer::{write_index, IndexDocument};

use std::path::{Path, PathBuf};

use crate::capabilities::StreamCapabilities;
use crate::config::AccessMode;
use crate::error::{Result, StreamError};
use crate::file::MediaFile;

/// Read window for index files
const INDEX_WINDOW: u32 = 128 * 1024;

/// An opened seek index with derived offsets
pub struct SeekIndex {
    file: MediaFile,
    capabilities: StreamCapabilities,
    /// First frame descriptor: right after the capability block and the
    /// stored frame count
    frames_base: u64,
    /// Sampling rate + bucket table: `frames_base + count * 22`
    time_to_index: u64,
    frame_count: u32,
    max_frame_size: u64,
}

impl SeekIndex {
    /// Open and validate an index file. `meta_path` only feeds the
    /// remediation message when the capability block is corrupt.
    pub fn open(seek_path: &Path, meta_path: &Path, mode: AccessMode) -> Result<SeekIndex> {
        let mut file = MediaFile::open(seek_path, INDEX_WINDOW, mode)?;

        let corrupt = |seek_path: &Path, meta_path: &Path| StreamError::CapabilitiesCorrupt {
            seek_path: seek_path.to_path_buf(),
            meta_path: meta_path.to_path_buf(),
        };

        if file.size() < 4 + 4 + 4 + 8 {
            return Err(StreamError::IndexCorrupt(format!(
                "index file {} is truncated ({} bytes)",
                seek_path.display(),
                file.size()
            )));
        }

        let cap_len = file.read_u32()? as u64;
        if 4 + cap_len + 4 + 4 + 8 > file.size() {
            return Err(corrupt(seek_path, meta_path));
        }
        let mut raw = vec![0u8; cap_len as usize];
        file.read_exact(&mut raw)
            .map_err(|_| corrupt(seek_path, meta_path))?;
        let capabilities = StreamCapabilities::from_bytes(raw);

        let seek_base = file.cursor();
        let frames_base = seek_base + 4;

        file.seek_to(file.size() - 8)?;
        let max_frame_size = file.read_u64()?;

        file.seek_to(seek_base)?;
        let frame_count = file.read_u32()?;
        let time_to_index =
            frames_base + frame_count as u64 * FrameDescriptor::ENCODED_LEN as u64;

        // sampling rate plus trailer must still fit past the frame table
        if time_to_index + 4 + 8 > file.size() {
            return Err(StreamError::IndexCorrupt(format!(
                "frame table ({} frames) exceeds index file {}",
                frame_count,
                seek_path.display()
            )));
        }

        tracing::debug!(
            path = %seek_path.display(),
            frame_count,
            max_frame_size,
            "opened seek index"
        );

        Ok(SeekIndex {
            file,
            capabilities,
            frames_base,
            time_to_index,
            frame_count,
            max_frame_size,
        })
    }

    pub fn capabilities(&self) -> &StreamCapabilities {
        &self.capabilities
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn max_frame_size(&self) -> u64 {
        self.max_frame_size
    }

    /// File position right after the capability block
    #[cfg(test)]
    pub(crate) fn seek_base(&self) -> u64 {
        self.frames_base - 4
    }

    /// Read the descriptor at `index`
    pub fn frame(&mut self, index: u32) -> Result<FrameDescriptor> {
        if index >= self.frame_count {
            return Err(StreamError::IndexCorrupt(format!(
                "frame index {} out of range ({} frames)",
                index, self.frame_count
            )));
        }
        self.file.seek_to(
            self.frames_base + index as u64 * FrameDescriptor::ENCODED_LEN as u64,
        )?;
        let mut raw = [0u8; FrameDescriptor::ENCODED_LEN];
        self.file.read_exact(&mut raw)?;
        FrameDescriptor::decode(&raw)
    }

    /// Resolve an absolute timestamp to a frame through the ms lookup
    /// table. Returns the frame index and its descriptor; the descriptor's
    /// own timestamp is the *actual* position (bucket granularity).
    pub fn resolve_timestamp(&mut self, timestamp_ms: u64) -> Result<(u32, FrameDescriptor)> {
        self.file.seek_to(self.time_to_index)?;
        let sampling_rate = self.file.read_u32()?;
        if sampling_rate == 0 {
            return Err(StreamError::IndexCorrupt(
                "zero sampling rate in lookup table".into(),
            ));
        }

        let table_len = (self.file.size() - 8 - (self.time_to_index + 4)) / 4;
        if table_len == 0 {
            return Err(StreamError::IndexCorrupt("empty lookup table".into()));
        }
        let bucket = (timestamp_ms / sampling_rate as u64).min(table_len - 1);

        self.file.seek_ahead(bucket * 4)?;
        let frame_index = self.file.read_u32()?;
        if frame_index >= self.frame_count {
            return Err(StreamError::IndexCorrupt(format!(
                "lookup bucket {} points at frame {} of {}",
                bucket, frame_index, self.frame_count
            )));
        }

        let frame = self.frame(frame_index)?;
        Ok((frame_index, frame))
    }

    /// Sampling rate of the ms lookup table
    pub fn sampling_rate(&mut self) -> Result<u32> {
        self.file.seek_to(self.time_to_index)?;
        self.file.read_u32()
    }

    /// Check that descriptors are stored in non-decreasing timestamp order
    pub fn validate(&mut self) -> Result<()> {
        let mut last = 0u64;
        for i in 0..self.frame_count {
            let frame = self.frame(i)?;
            if frame.time_ms < last {
                return Err(StreamError::IndexCorrupt(format!(
                    "frame {} at {}ms breaks timestamp order (previous {}ms)",
                    i, frame.time_ms, last
                )));
            }
            last = frame.time_ms;
        }
        Ok(())
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}
