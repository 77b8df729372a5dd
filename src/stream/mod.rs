//! File-backed input stream.
//!
//! [`FileStream`] is the aggregate: it owns the seek index, the media
//! file, the playback cursor and the scratch buffers, holds a weak
//! reference to the output sink, and runs the state machine and feed
//! scheduler. [`StreamHandle`] owns a `FileStream` plus its pacing timer
//! and is what a play session keeps.

mod cursor;
mod feed;
mod timer;

pub use cursor::PlaybackState;
pub(crate) use cursor::PlaybackCursor;

use std::path::Path;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::capabilities::StreamCapabilities;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::file::{window_size_for, MediaFile};
use crate::index::SeekIndex;
use crate::sink::{SharedSink, WeakSink};
use crate::source::{ensure_index, info_path, meta_path, IndexGenerator};
use crate::telemetry::UsageRecorder;

/// One file-backed input stream
pub struct FileStream {
    id: Uuid,
    name: String,
    index: SeekIndex,
    media: MediaFile,
    cursor: PlaybackCursor,
    state: PlaybackState,
    codecs_sent: bool,
    client_buffer_secs: u32,
    max_skip_run: u32,
    audio_buffer: BytesMut,
    video_buffer: BytesMut,
    sink: WeakSink,
    served_bytes: u64,
    usage: Option<UsageRecorder>,
    failed: bool,
}

impl FileStream {
    /// Run the initialization protocol for `media_path`. Every step is a
    /// hard precondition for the next; any failure aborts construction and
    /// releases whatever was acquired so far.
    pub fn open(
        media_path: &Path,
        generator: &dyn IndexGenerator,
        config: &EngineConfig,
        sink: WeakSink,
    ) -> Result<FileStream> {
        config.validate()?;

        let seek = ensure_index(media_path, generator, config)?;
        let index = SeekIndex::open(&seek, &meta_path(media_path), config.access_mode)?;

        let window = window_size_for(index.max_frame_size());
        let media = MediaFile::open(media_path, window, config.access_mode)?;

        let usage = config
            .usage_records
            .then(|| UsageRecorder::new(info_path(media_path)));
        if let Some(usage) = &usage {
            usage.record_open();
        }

        let id = Uuid::new_v4();
        tracing::info!(
            stream = %id,
            media = %media_path.display(),
            frames = index.frame_count(),
            window,
            "stream initialized"
        );

        Ok(FileStream {
            id,
            name: media_path.display().to_string(),
            cursor: PlaybackCursor::new(index.frame_count()),
            index,
            media,
            state: PlaybackState::Paused,
            codecs_sent: false,
            client_buffer_secs: config.client_buffer_secs,
            max_skip_run: config.max_skip_run,
            audio_buffer: BytesMut::new(),
            video_buffer: BytesMut::new(),
            sink,
            served_bytes: 0,
            usage,
            failed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn capabilities(&self) -> &StreamCapabilities {
        self.index.capabilities()
    }

    pub fn client_buffer(&self) -> u32 {
        self.client_buffer_secs
    }

    /// Adjust the client-side buffer budget. Zero is ignored, values above
    /// 120 s are clamped, and the budget never decreases.
    pub fn set_client_buffer(&mut self, secs: u32) {
        if secs == 0 {
            tracing::warn!(stream = %self.id, "ignoring zero client buffer");
            return;
        }
        let secs = secs.min(120);
        if secs < self.client_buffer_secs {
            return;
        }
        self.client_buffer_secs = secs;
    }

    /// Seek to `timestamp_ms`, arm the optional play limit, enter
    /// `Playing` and trigger an immediate feed. Returns the actual
    /// timestamp of the resolved frame.
    pub fn play(&mut self, timestamp_ms: u64, limit_ms: Option<u64>) -> Result<u64> {
        self.cursor.play_limit_ms = limit_ms;
        let actual = self.internal_seek(timestamp_ms)?;
        self.state = PlaybackState::Playing;
        tracing::debug!(stream = %self.id, timestamp_ms, actual, "play");
        self.pump()?;
        Ok(actual)
    }

    /// `Playing -> Paused`; no-op otherwise
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            tracing::debug!(stream = %self.id, "paused");
        }
    }

    /// `Paused | Finished -> Playing` with an immediate feed; no-op when
    /// already playing
    pub fn resume(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            return Ok(());
        }
        self.state = PlaybackState::Playing;
        tracing::debug!(stream = %self.id, "resumed");
        self.pump()
    }

    /// Random seek in any state. A `Finished` stream resumes playing from
    /// the resolved frame.
    pub fn seek(&mut self, timestamp_ms: u64) -> Result<u64> {
        let actual = self.internal_seek(timestamp_ms)?;
        tracing::debug!(stream = %self.id, timestamp_ms, actual, "seek");
        if self.state == PlaybackState::Finished {
            self.state = PlaybackState::Playing;
            self.pump()?;
        }
        Ok(actual)
    }

    /// `Playing -> Paused`; the stream itself stays alive
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            tracing::debug!(stream = %self.id, "stopped");
        }
    }

    /// Resolve `timestamp_ms` through the lookup table and re-anchor the
    /// cursor there. Codec headers will be resent on the next feed cycle.
    fn internal_seek(&mut self, timestamp_ms: u64) -> Result<u64> {
        self.codecs_sent = false;
        let (frame_index, frame) = self.index.resolve_timestamp(timestamp_ms)?;
        self.cursor.reset_at(frame_index, frame);
        Ok(frame.time_ms)
    }

    /// Drive one feed cycle. The transport calls this whenever its output
    /// buffer drains; the pacing timer calls the same path. A failure is
    /// fatal to this stream only: it is parked and never fed again.
    pub fn pump(&mut self) -> Result<()> {
        if self.failed {
            return Ok(());
        }
        if let Err(e) = self.feed() {
            tracing::error!(
                stream = %self.id,
                name = %self.name,
                error = %e,
                "feed failed; tearing stream down"
            );
            self.failed = true;
            self.state = PlaybackState::Paused;
            return Err(e);
        }
        Ok(())
    }

    /// Timer entry point; `false` stops the timer
    pub(crate) fn on_timer_tick(&mut self) -> bool {
        self.pump().is_ok() && !self.failed
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        if let Some(usage) = &self.usage {
            usage.record_served(self.served_bytes, self.media.size());
        }
    }
}

/// Owner of a stream and its pacing timer.
///
/// Dropping the handle aborts the timer task first, then releases the
/// stream, so a pending tick can never touch freed state.
pub struct StreamHandle {
    // field order matters: the timer drops before the stream it drives
    timer: Option<timer::FeedTimer>,
    inner: Arc<Mutex<FileStream>>,
}

impl StreamHandle {
    /// Open a stream for `media_path` feeding `sink`. With `config.paced`
    /// this must be called inside a tokio runtime.
    pub fn open(
        media_path: &Path,
        generator: &dyn IndexGenerator,
        config: &EngineConfig,
        sink: &SharedSink,
    ) -> Result<StreamHandle> {
        let stream = FileStream::open(media_path, generator, config, Arc::downgrade(sink))?;
        let inner = Arc::new(Mutex::new(stream));
        let timer = config
            .paced
            .then(|| timer::FeedTimer::spawn(Arc::downgrade(&inner), config.timer_interval_secs()));
        Ok(StreamHandle { timer, inner })
    }

    pub fn play(&self, timestamp_ms: u64, limit_ms: Option<u64>) -> Result<u64> {
        self.inner.lock().play(timestamp_ms, limit_ms)
    }

    pub fn pause(&self) {
        self.inner.lock().pause()
    }

    pub fn resume(&self) -> Result<()> {
        self.inner.lock().resume()
    }

    pub fn seek(&self, timestamp_ms: u64) -> Result<u64> {
        self.inner.lock().seek(timestamp_ms)
    }

    pub fn stop(&self) {
        self.inner.lock().stop()
    }

    pub fn pump(&self) -> Result<()> {
        self.inner.lock().pump()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state()
    }

    pub fn capabilities(&self) -> StreamCapabilities {
        self.inner.lock().capabilities().clone()
    }

    pub fn set_client_buffer(&self, secs: u32) {
        self.inner.lock().set_client_buffer(secs)
    }

    pub fn client_buffer(&self) -> u32 {
        self.inner.lock().client_buffer()
    }

    pub fn is_paced(&self) -> bool {
        self.timer.is_some()
    }
}
