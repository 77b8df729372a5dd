//! Buffered backend with a process-wide shared handle registry.
//!
//! Handles are keyed by canonical path, so concurrent viewers of the same
//! file share one OS file descriptor and one read-ahead window. An entry is
//! created on first open and torn down when the last handle drops.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::Result;

static REGISTRY: OnceLock<DashMap<PathBuf, Weak<SharedEntry>>> = OnceLock::new();

fn registry() -> &'static DashMap<PathBuf, Weak<SharedEntry>> {
    REGISTRY.get_or_init(DashMap::new)
}

/// One shared file: descriptor plus read-ahead window, mutex-guarded so
/// independent handles can issue positioned reads from any thread.
pub(crate) struct SharedEntry {
    canonical: PathBuf,
    size: u64,
    window: Mutex<Window>,
}

struct Window {
    file: File,
    start: u64,
    buf: Vec<u8>,
    window_size: usize,
}

impl Window {
    /// Positioned read: serve from the window, refilling it at `offset`
    /// on a miss.
    fn read_at(&mut self, offset: u64, out: &mut [u8]) -> std::io::Result<()> {
        let len = out.len() as u64;
        if offset >= self.start && offset + len <= self.start + self.buf.len() as u64 {
            let from = (offset - self.start) as usize;
            out.copy_from_slice(&self.buf[from..from + out.len()]);
            return Ok(());
        }

        let want = self.window_size.max(out.len());
        self.file.seek(SeekFrom::Start(offset))?;
        self.buf.resize(want, 0);
        let mut filled = 0;
        while filled < want {
            let n = self.file.read(&mut self.buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.buf.truncate(filled);
        self.start = offset;

        if filled < out.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read from shared file",
            ));
        }
        out.copy_from_slice(&self.buf[..out.len()]);
        Ok(())
    }
}

impl Drop for SharedEntry {
    fn drop(&mut self) {
        if let Some(reg) = REGISTRY.get() {
            // only drop the slot if no new handle raced in under this path
            reg.remove_if(&self.canonical, |_, weak| weak.strong_count() == 0);
        }
    }
}

/// A caller-held reference to a shared entry
pub(crate) struct SharedHandle {
    entry: Arc<SharedEntry>,
}

impl SharedHandle {
    pub(crate) fn size(&self) -> u64 {
        self.entry.size
    }

    pub(crate) fn read_at(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        self.entry.window.lock().read_at(offset, out)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn shares_entry_with(&self, other: &SharedHandle) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

/// Open (or join) the shared entry for `path`
pub(crate) fn open(path: &Path, window_size: u32) -> Result<SharedHandle> {
    let canonical = std::fs::canonicalize(path)?;

    match registry().entry(canonical.clone()) {
        dashmap::mapref::entry::Entry::Occupied(mut slot) => {
            if let Some(entry) = slot.get().upgrade() {
                return Ok(SharedHandle { entry });
            }
            // last handle is mid-drop; replace the dead weak slot
            let entry = new_entry(&canonical, window_size)?;
            slot.insert(Arc::downgrade(&entry));
            Ok(SharedHandle { entry })
        }
        dashmap::mapref::entry::Entry::Vacant(slot) => {
            let entry = new_entry(&canonical, window_size)?;
            slot.insert(Arc::downgrade(&entry));
            Ok(SharedHandle { entry })
        }
    }
}

fn new_entry(canonical: &Path, window_size: u32) -> Result<Arc<SharedEntry>> {
    let file = File::open(canonical)?;
    let size = file.metadata()?.len();
    Ok(Arc::new(SharedEntry {
        canonical: canonical.to_path_buf(),
        size,
        window: Mutex::new(Window {
            file,
            start: 0,
            buf: Vec::new(),
            window_size: window_size.max(1) as usize,
        }),
    }))
}
