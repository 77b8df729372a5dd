//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Backing mechanism for media and index file access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Direct virtual-memory view of the file
    Mapped,
    /// Buffered reads through the process-wide shared handle registry
    Shared,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds of media assumed queued on the receiving end; bounds how
    /// far ahead the feed may deliver. Valid range (0, 120].
    pub client_buffer_secs: u32,

    /// Timer interval divisor: the feed timer fires every
    /// `client_buffer_secs / buffer_denominator` seconds
    pub buffer_denominator: u32,

    /// Drive the feed with a periodic timer (in addition to `pump()`)
    pub paced: bool,

    /// File access backend
    pub access_mode: AccessMode,

    /// Rename sources the index generator cannot process to `<name>.bad`
    pub rename_bad_files: bool,

    /// Seek indexes are produced out-of-process; never invoke the
    /// generator, fail instead when an index is missing
    pub external_seek_generator: bool,

    /// Maximum run of metadata-only / zero-length frames one feed cycle
    /// may skip before the index is declared corrupt
    pub max_skip_run: u32,

    /// Write open-count / served-bytes records next to the media file
    pub usage_records: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_buffer_secs: 30,
            buffer_denominator: 3,
            paced: true,
            access_mode: AccessMode::Shared,
            rename_bad_files: false,
            external_seek_generator: false,
            max_skip_run: 128,
            usage_records: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig =
            toml::from_str(&content).map_err(|e| StreamError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| StreamError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_buffer_secs == 0 || self.client_buffer_secs > 120 {
            return Err(StreamError::Config(format!(
                "client_buffer_secs must be in (0, 120], got {}",
                self.client_buffer_secs
            )));
        }
        if self.max_skip_run == 0 {
            return Err(StreamError::Config("max_skip_run must be nonzero".into()));
        }
        Ok(())
    }

    /// Feed timer interval in seconds: `client_buffer_secs / denominator`,
    /// clamped to `[1, client_buffer_secs - 1]`
    pub fn timer_interval_secs(&self) -> u32 {
        let denominator = if self.buffer_denominator == 0 {
            3
        } else {
            self.buffer_denominator
        };
        let val = self.client_buffer_secs / denominator;
        val.max(1).min(self.client_buffer_secs.saturating_sub(1).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.client_buffer_secs, 30);
        assert_eq!(config.buffer_denominator, 3);
    }

    #[test]
    fn test_buffer_range_rejected() {
        let mut config = EngineConfig::default();
        config.client_buffer_secs = 0;
        assert!(config.validate().is_err());
        config.client_buffer_secs = 121;
        assert!(config.validate().is_err());
        config.client_buffer_secs = 120;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timer_interval_clamped() {
        let mut config = EngineConfig::default();
        assert_eq!(config.timer_interval_secs(), 10);

        // small buffers never fall below one second
        config.client_buffer_secs = 2;
        assert_eq!(config.timer_interval_secs(), 1);

        // a zero denominator falls back to the default of 3
        config.client_buffer_secs = 30;
        config.buffer_denominator = 0;
        assert_eq!(config.timer_interval_secs(), 10);

        // interval stays below the buffer length
        config.buffer_denominator = 1;
        assert_eq!(config.timer_interval_secs(), 29);
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let config = EngineConfig {
            client_buffer_secs: 15,
            access_mode: AccessMode::Mapped,
            ..Default::default()
        };
        config.to_file(path.to_str().unwrap()).unwrap();
        let loaded = EngineConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.client_buffer_secs, 15);
        assert_eq!(loaded.access_mode, AccessMode::Mapped);
    }
}
