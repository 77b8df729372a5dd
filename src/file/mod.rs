//! Windowed file access.
//!
//! Both the seek index and the raw media file are read through [`MediaFile`],
//! which hides the backing mechanism: a direct memory-mapped view, or
//! buffered reads with one shared read-ahead window per file (see
//! [`shared`]). The two backends are functionally equivalent; the mode is
//! picked at configuration time.
//!
//! Every handle keeps a private cursor, so several streams can read the
//! same underlying file without corrupting each other's position.

mod mapped;
mod shared;

use std::io;
use std::path::{Path, PathBuf};

use crate::config::AccessMode;
use crate::error::Result;

/// Window sizing policy: `max_frame_size * 16`, floored at 64 KiB and
/// halved when above 1 MiB.
pub fn window_size_for(max_frame_size: u64) -> u32 {
    let mut window = max_frame_size.saturating_mul(16).min(u32::MAX as u64) as u32;
    if window < 65536 {
        window = 65536;
    }
    if window > 1024 * 1024 {
        window /= 2;
    }
    window
}

enum Backend {
    Mapped(mapped::MappedFile),
    Shared(shared::SharedHandle),
}

/// Random-access view of an on-disk file with a private cursor
pub struct MediaFile {
    backend: Backend,
    path: PathBuf,
    size: u64,
    cursor: u64,
}

impl MediaFile {
    /// Open `path` with the given read-ahead window size hint
    pub fn open(path: &Path, window_size: u32, mode: AccessMode) -> Result<MediaFile> {
        let (backend, size) = match mode {
            AccessMode::Mapped => {
                let mapped = mapped::MappedFile::open(path)?;
                let size = mapped.size();
                (Backend::Mapped(mapped), size)
            }
            AccessMode::Shared => {
                let handle = shared::open(path, window_size)?;
                let size = handle.size();
                (Backend::Shared(handle), size)
            }
        };
        let mode_str = match mode {
            AccessMode::Mapped => "mapped",
            AccessMode::Shared => "shared",
        };
        tracing::debug!(path = %path.display(), size, window_size, mode = mode_str, "opened media file");
        Ok(MediaFile {
            backend,
            path: path.to_path_buf(),
            size,
            cursor: 0,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn seek_begin(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset > self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "seek to {} beyond end of {} ({} bytes)",
                    offset,
                    self.path.display(),
                    self.size
                ),
            )
            .into());
        }
        self.cursor = offset;
        Ok(())
    }

    pub fn seek_ahead(&mut self, delta: u64) -> Result<()> {
        self.seek_to(self.cursor.saturating_add(delta))
    }

    /// Fill `buf` from the current cursor, advancing it
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.cursor + buf.len() as u64;
        if end > self.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of {} bytes at {} past end of {} ({} bytes)",
                    buf.len(),
                    self.cursor,
                    self.path.display(),
                    self.size
                ),
            )
            .into());
        }
        match &self.backend {
            Backend::Mapped(mapped) => mapped.read_at(self.cursor, buf)?,
            Backend::Shared(handle) => handle.read_at(self.cursor, buf)?,
        }
        self.cursor = end;
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; 8];
        self.read_exact(&mut raw)?;
        Ok(u64::from_le_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_window_size_policy() {
        // floor at 64 KiB
        assert_eq!(window_size_for(0), 65536);
        assert_eq!(window_size_for(1000), 65536);
        // 16x multiplier inside the band
        assert_eq!(window_size_for(8192), 131072);
        // halved above 1 MiB
        assert_eq!(window_size_for(128 * 1024), 1024 * 1024);
        assert_eq!(window_size_for(256 * 1024), 2 * 1024 * 1024);
    }

    #[test]
    fn test_backends_read_identically() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let f = fixture(&data);

        for mode in [AccessMode::Mapped, AccessMode::Shared] {
            // small window to force refills in shared mode
            let mut file = MediaFile::open(f.path(), 4096, mode).unwrap();
            assert_eq!(file.size(), data.len() as u64);

            let mut buf = vec![0u8; 10_000];
            file.seek_to(123_456).unwrap();
            file.read_exact(&mut buf).unwrap();
            assert_eq!(&buf[..], &data[123_456..133_456]);
            assert_eq!(file.cursor(), 133_456);

            file.seek_begin().unwrap();
            assert_eq!(file.read_u32().unwrap(), u32::from_le_bytes(data[..4].try_into().unwrap()));
            assert_eq!(
                file.read_u64().unwrap(),
                u64::from_le_bytes(data[4..12].try_into().unwrap())
            );
        }
    }

    #[test]
    fn test_seek_and_read_bounds() {
        let f = fixture(&[0u8; 100]);
        let mut file = MediaFile::open(f.path(), 65536, AccessMode::Shared).unwrap();

        assert!(file.seek_to(100).is_ok());
        assert!(file.seek_to(101).is_err());

        file.seek_to(96).unwrap();
        let mut buf = [0u8; 8];
        assert!(file.read_exact(&mut buf).is_err());
    }
}
