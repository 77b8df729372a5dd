//! Memory-mapped backend.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::Result;

/// Read-only map of a whole file. Paging is left to the OS, so no shared
/// cache is needed for this backend.
pub(crate) struct MappedFile {
    map: Option<Mmap>,
    size: u64,
}

impl MappedFile {
    pub(crate) fn open(path: &Path) -> Result<MappedFile> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        // mapping an empty file is an error on most platforms
        let map = if size == 0 {
            None
        } else {
            // SAFETY: the map is read-only and the engine never serves a
            // file that is being truncated while open.
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(MappedFile { map, size })
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    /// Copy `buf.len()` bytes starting at `offset`. The caller has already
    /// bounds-checked the range against `size`.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let Some(map) = self.map.as_ref() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read from empty file",
            )
            .into());
        };
        let start = offset as usize;
        buf.copy_from_slice(&map[start..start + buf.len()]);
        Ok(())
    }
}
