//! Usage info records.
//!
//! Auxiliary bookkeeping written next to the media file: how often a
//! resource was opened and what share of its bytes has been served.
//! Telemetry never fails a stream; write errors are logged and dropped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// On-disk record, one JSON object per resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    pub open_count: u64,
    pub total_served_bytes: u64,
    pub file_size: u64,
    pub serve_ratio: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Writer bound to one resource's info path
#[derive(Debug, Clone)]
pub struct UsageRecorder {
    info_path: PathBuf,
}

impl UsageRecorder {
    pub fn new(info_path: PathBuf) -> Self {
        Self { info_path }
    }

    pub fn load(path: &Path) -> UsageRecord {
        std::fs::read(path)
            .ok()
            .and_then(|raw| serde_json::from_slice(&raw).ok())
            .unwrap_or_default()
    }

    fn store(&self, record: &UsageRecord) {
        let mut record = record.clone();
        record.updated_at = Some(Utc::now());
        match serde_json::to_vec_pretty(&record) {
            Ok(raw) => {
                if let Err(e) = std::fs::write(&self.info_path, raw) {
                    tracing::warn!(path = %self.info_path.display(), error = %e, "usage record write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "usage record encode failed"),
        }
    }

    /// Count one open of the resource
    pub fn record_open(&self) {
        let mut record = Self::load(&self.info_path);
        record.open_count += 1;
        self.store(&record);
    }

    /// Accumulate bytes served during one stream's lifetime
    pub fn record_served(&self, served_bytes: u64, file_size: u64) {
        if file_size == 0 {
            return;
        }
        let mut record = Self::load(&self.info_path);
        record.total_served_bytes += served_bytes;
        record.file_size = file_size;
        record.serve_ratio = record.total_served_bytes as f64 / file_size as f64;
        self.store(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_count_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let info = dir.path().join("movie.flv.info");
        let recorder = UsageRecorder::new(info.clone());

        recorder.record_open();
        recorder.record_open();

        let record = UsageRecorder::load(&info);
        assert_eq!(record.open_count, 2);
        assert!(record.updated_at.is_some());
    }

    #[test]
    fn test_serve_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let info = dir.path().join("movie.flv.info");
        let recorder = UsageRecorder::new(info.clone());

        recorder.record_served(250, 1000);
        recorder.record_served(250, 1000);

        let record = UsageRecorder::load(&info);
        assert_eq!(record.total_served_bytes, 500);
        assert_eq!(record.file_size, 1000);
        assert!((record.serve_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_garbage_record_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let info = dir.path().join("x.info");
        std::fs::write(&info, b"not json").unwrap();
        let recorder = UsageRecorder::new(info.clone());
        recorder.record_open();
        assert_eq!(UsageRecorder::load(&info).open_count, 1);
    }
}
