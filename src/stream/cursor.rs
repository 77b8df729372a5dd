//! Playback position and timing counters.

use tokio::time::Instant;

use crate::index::FrameDescriptor;

/// Stream playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Initial state; nothing is fed
    Paused,
    /// The feed scheduler delivers frames
    Playing,
    /// End of frames or play limit reached
    Finished,
}

/// Per-stream playback cursor, owned exclusively by the stream and mutated
/// only by the feed scheduler and seek operations.
pub(crate) struct PlaybackCursor {
    /// Next frame the feed will consider
    pub current_index: u32,
    pub total_frames: u32,
    /// Descriptor at the seek point, then the last materialized frame
    pub current: Option<FrameDescriptor>,
    /// Whole seconds of media delivered since the last seek
    pub total_sent_secs: u64,
    /// Timeline second of the seek point
    pub sent_base_secs: u64,
    /// Wall clock at the last seek
    pub started_at: Instant,
    /// Playback ceiling relative to the seek point; `None` = unlimited
    pub play_limit_ms: Option<u64>,
}

impl PlaybackCursor {
    pub fn new(total_frames: u32) -> Self {
        Self {
            current_index: 0,
            total_frames,
            current: None,
            total_sent_secs: 0,
            sent_base_secs: 0,
            started_at: Instant::now(),
            play_limit_ms: None,
        }
    }

    /// Re-anchor all counters at a freshly resolved frame
    pub fn reset_at(&mut self, index: u32, frame: FrameDescriptor) {
        self.started_at = Instant::now();
        self.total_sent_secs = 0;
        self.sent_base_secs = frame.time_ms / 1000;
        self.current_index = index;
        self.current = Some(frame);
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Media seconds between the seek point and `frame`
    pub fn sent_secs_at(&self, frame: &FrameDescriptor) -> u64 {
        (frame.time_ms / 1000).saturating_sub(self.sent_base_secs)
    }

    /// End of frames, or the play limit exceeded
    pub fn completed(&self) -> bool {
        if self.current_index >= self.total_frames {
            return true;
        }
        if let Some(limit_ms) = self.play_limit_ms {
            if limit_ms < self.total_sent_secs * 1000 {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FrameKind;

    fn frame_at(time_ms: u64) -> FrameDescriptor {
        FrameDescriptor {
            time_ms,
            kind: FrameKind::Video,
            is_binary_header: false,
            length: 1,
            media_offset: 0,
        }
    }

    #[test]
    fn test_reset_anchors_counters() {
        let mut cursor = PlaybackCursor::new(100);
        cursor.total_sent_secs = 42;
        cursor.reset_at(7, frame_at(65_500));
        assert_eq!(cursor.current_index, 7);
        assert_eq!(cursor.total_sent_secs, 0);
        assert_eq!(cursor.sent_base_secs, 65);
        assert_eq!(cursor.sent_secs_at(&frame_at(70_000)), 5);
        // frames never precede the seek point, but a rounded-down base
        // must not underflow
        assert_eq!(cursor.sent_secs_at(&frame_at(64_000)), 0);
    }

    #[test]
    fn test_completed_by_index_and_limit() {
        let mut cursor = PlaybackCursor::new(3);
        assert!(!cursor.completed());
        cursor.current_index = 3;
        assert!(cursor.completed());

        let mut cursor = PlaybackCursor::new(100);
        cursor.play_limit_ms = Some(5000);
        cursor.total_sent_secs = 5;
        assert!(!cursor.completed());
        cursor.total_sent_secs = 6;
        assert!(cursor.completed());
    }
}
