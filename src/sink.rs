//! Output sink contract.
//!
//! The network-facing collaborator implements this trait. The engine holds
//! only a weak reference to the sink: its lifetime is independent and may
//! end before the stream's. A `false` return from a feed call is treated
//! as a delivery failure, fatal to the one stream being fed.

use std::sync::{Arc, Weak};

/// Receiver of paced access units. Implementations manage their own
/// interior mutability; the engine calls from one thread at a time.
pub trait OutputSink: Send + Sync {
    /// Deliver one media payload. `processed` and `total` describe partial
    /// delivery of a larger unit; the engine always sends whole frames,
    /// so `processed` is 0 and `total` equals `payload.len()`.
    fn feed_data(
        &self,
        payload: &[u8],
        processed: usize,
        total: usize,
        timestamp_ms: u64,
        is_audio: bool,
    ) -> bool;

    /// Deliver a metadata-only record. Not counted as media progress.
    fn feed_metadata(&self, payload: &[u8], timestamp_ms: u64) -> bool;

    /// The stream ran to completion (end of frames or play limit)
    fn signal_stream_completed(&self);
}

/// Shared, independently-owned sink
pub type SharedSink = Arc<dyn OutputSink>;
/// The engine's non-owning back-reference
pub type WeakSink = Weak<dyn OutputSink>;
