//! Feed pacing timer.
//!
//! A tokio task holding a weak reference to the stream. The task upgrades
//! per tick and exits when the stream is gone or its feed failed, so a
//! tick pending at teardown is a guaranteed no-op. Dropping the timer
//! aborts the task before the owning handle releases the stream.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::stream::FileStream;

pub(crate) struct FeedTimer {
    task: JoinHandle<()>,
}

impl FeedTimer {
    /// Spawn the pacing task. Must run inside a tokio runtime.
    pub(crate) fn spawn(stream: Weak<Mutex<FileStream>>, interval_secs: u32) -> FeedTimer {
        let period = Duration::from_secs(interval_secs.max(1) as u64);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately; state transitions
            // already trigger their own feed
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(stream) = stream.upgrade() else {
                    break;
                };
                if !tick(&stream) {
                    break;
                }
            }
        });
        FeedTimer { task }
    }
}

fn tick(stream: &Arc<Mutex<FileStream>>) -> bool {
    stream.lock().on_timer_tick()
}

impl Drop for FeedTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
