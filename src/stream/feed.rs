//! Feed scheduler and codec resend.
//!
//! One cycle delivers at most one normal media frame; metadata records,
//! codec-header frames and zero-length frames are skipped in a bounded
//! loop so a pathological index cannot spin the engine forever.

use bytes::BytesMut;

use crate::error::{Result, StreamError};
use crate::file::MediaFile;
use crate::index::{FrameDescriptor, FrameKind};
use crate::sink::SharedSink;
use crate::stream::cursor::PlaybackState;
use crate::stream::FileStream;

impl FileStream {
    pub(crate) fn feed(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }

        if !self.codecs_sent {
            self.send_codecs()?;
        }

        let mut skip_run = 0u32;
        loop {
            // never feed ahead of the configured buffer window
            let elapsed = self.cursor.elapsed_secs();
            if self.cursor.total_sent_secs as i64 - elapsed as i64
                >= self.client_buffer_secs as i64
            {
                return Ok(());
            }

            if self.cursor.completed() {
                tracing::debug!(stream = %self.id, "done streaming file");
                self.upgrade_sink()?.signal_stream_completed();
                self.state = PlaybackState::Finished;
                return Ok(());
            }

            let frame = self.index.frame(self.cursor.current_index)?;

            if frame.kind == FrameKind::Data {
                // metadata records advance the cursor but not the clock
                self.cursor.current_index += 1;
                let mut payload = vec![0u8; frame.length as usize];
                if frame.length > 0 {
                    self.media.seek_to(frame.media_offset)?;
                    self.media.read_exact(&mut payload)?;
                }
                self.served_bytes += payload.len() as u64;
                if !self.upgrade_sink()?.feed_metadata(&payload, frame.time_ms) {
                    return Err(StreamError::Delivery(format!(
                        "metadata at {}ms rejected by sink",
                        frame.time_ms
                    )));
                }
                self.bump_skip_run(&mut skip_run)?;
                continue;
            }

            if frame.is_binary_header {
                // codec configuration is owned by the resend path
                self.cursor.current_index += 1;
                self.bump_skip_run(&mut skip_run)?;
                continue;
            }

            let is_audio = frame.kind == FrameKind::Audio;
            fill_scratch(
                &mut self.media,
                if is_audio {
                    &mut self.audio_buffer
                } else {
                    &mut self.video_buffer
                },
                &frame,
            )?;

            self.cursor.total_sent_secs = self.cursor.sent_secs_at(&frame);
            self.cursor.current = Some(frame);
            self.cursor.current_index += 1;

            if frame.length == 0 {
                // timestamp-only frame: moves the clock, nothing to deliver
                self.bump_skip_run(&mut skip_run)?;
                continue;
            }

            self.served_bytes += frame.length as u64;
            let sink = self.upgrade_sink()?;
            let buffer = if is_audio {
                &self.audio_buffer
            } else {
                &self.video_buffer
            };
            if !sink.feed_data(buffer, 0, buffer.len(), frame.time_ms, is_audio) {
                return Err(StreamError::Delivery(format!(
                    "{} frame at {}ms rejected by sink",
                    if is_audio { "audio" } else { "video" },
                    frame.time_ms
                )));
            }
            return Ok(());
        }
    }

    /// Re-deliver codec-configuration frames after open or any seek.
    /// Headers carry the current (post-seek) timestamp, not their own:
    /// codec configuration is logically "now".
    fn send_codecs(&mut self) -> Result<()> {
        let count = self.index.frame_count();
        if count == 0 {
            self.codecs_sent = true;
            return Ok(());
        }

        let first = self.index.frame(0)?;
        // if the first frame carries no codec config, the second cannot
        if !first.is_binary_header {
            self.codecs_sent = true;
            return Ok(());
        }

        let now_ms = self.cursor.current.map(|f| f.time_ms).unwrap_or(0);
        self.deliver_header(&first, now_ms)?;

        if count > 1 {
            let second = self.index.frame(1)?;
            if second.is_binary_header {
                self.deliver_header(&second, now_ms)?;
            }
        }

        self.codecs_sent = true;
        Ok(())
    }

    fn deliver_header(&mut self, frame: &FrameDescriptor, timestamp_ms: u64) -> Result<()> {
        let is_audio = frame.kind == FrameKind::Audio;
        fill_scratch(
            &mut self.media,
            if is_audio {
                &mut self.audio_buffer
            } else {
                &mut self.video_buffer
            },
            frame,
        )?;
        self.served_bytes += frame.length as u64;

        let sink = self.upgrade_sink()?;
        let buffer = if is_audio {
            &self.audio_buffer
        } else {
            &self.video_buffer
        };
        if !sink.feed_data(buffer, 0, buffer.len(), timestamp_ms, is_audio) {
            return Err(StreamError::Delivery(format!(
                "codec header at {}ms rejected by sink",
                timestamp_ms
            )));
        }
        Ok(())
    }

    fn bump_skip_run(&self, run: &mut u32) -> Result<()> {
        *run += 1;
        if *run > self.max_skip_run {
            return Err(StreamError::IndexCorrupt(format!(
                "more than {} consecutive skippable frames",
                self.max_skip_run
            )));
        }
        Ok(())
    }

    fn upgrade_sink(&self) -> Result<SharedSink> {
        self.sink
            .upgrade()
            .ok_or_else(|| StreamError::Delivery("output sink is gone".into()))
    }
}

/// Materialize a frame's payload window from the media file
fn fill_scratch(media: &mut MediaFile, buffer: &mut BytesMut, frame: &FrameDescriptor) -> Result<()> {
    buffer.clear();
    buffer.resize(frame.length as usize, 0);
    if frame.length > 0 {
        media.seek_to(frame.media_offset)?;
        media.read_exact(&mut buffer[..])?;
    }
    Ok(())
}
