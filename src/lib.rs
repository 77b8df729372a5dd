//! Index-driven VOD streaming engine.
//!
//! Serves individual audio/video access units from a file-backed source to
//! an output sink at the correct pace, driven by a pre-built binary seek
//! index. Supports play, pause, resume, seek and stop while honoring a
//! client-side buffering budget.
//!
//! Container parsing (building the index) and the network transport are
//! external collaborators: see [`IndexGenerator`] and [`OutputSink`].

pub(crate) mod capabilities;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod file;
pub(crate) mod index;
pub(crate) mod sink;
pub(crate) mod source;
pub(crate) mod stream;
pub(crate) mod telemetry;

#[cfg(test)]
pub(crate) mod tests;

pub use capabilities::StreamCapabilities;
pub use config::{AccessMode, EngineConfig};
pub use error::{Result, StreamError};
pub use file::{window_size_for, MediaFile};
pub use index::{write_index, FrameDescriptor, FrameKind, IndexDocument, SeekIndex};
pub use sink::{OutputSink, SharedSink, WeakSink};
pub use source::{ensure_index, info_path, meta_path, seek_path, IndexGenerator};
pub use stream::{FileStream, PlaybackState, StreamHandle};
pub use telemetry::{UsageRecord, UsageRecorder};
