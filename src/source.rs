//! Source resolution and on-demand index generation.
//!
//! Container parsing lives outside this crate: an [`IndexGenerator`]
//! implementation scans a source file once and hands back the capability
//! block plus the full descriptor table. The engine persists that document
//! next to the media file and never touches the container again.

use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::error::{Result, StreamError};
use crate::index::{write_index, IndexDocument};

/// Suffix of the seek index artifact
pub const SEEK_SUFFIX: &str = "seek";
/// Suffix of the generator's own metadata artifact
pub const META_SUFFIX: &str = "meta";
/// Suffix of the usage info record
pub const INFO_SUFFIX: &str = "info";

/// Container-format collaborator: scan a source file, produce its index
pub trait IndexGenerator: Send + Sync {
    fn process(&self, source: &Path) -> Result<IndexDocument>;
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

pub fn seek_path(media: &Path) -> PathBuf {
    with_suffix(media, SEEK_SUFFIX)
}

pub fn meta_path(media: &Path) -> PathBuf {
    with_suffix(media, META_SUFFIX)
}

pub fn info_path(media: &Path) -> PathBuf {
    with_suffix(media, INFO_SUFFIX)
}

/// Make sure a seek index exists for `media`, generating one through the
/// collaborator when allowed. Returns the index path.
pub fn ensure_index(
    media: &Path,
    generator: &dyn IndexGenerator,
    config: &EngineConfig,
) -> Result<PathBuf> {
    let seek = seek_path(media);
    if seek.exists() {
        return Ok(seek);
    }

    if config.external_seek_generator {
        return Err(StreamError::UnsupportedSource(format!(
            "no seek index at {} and index generation is external",
            seek.display()
        )));
    }

    tracing::info!(source = %media.display(), "generating seek index");
    let document = match generator.process(media) {
        Ok(document) => document,
        Err(e) => {
            if config.rename_bad_files {
                let bad = with_suffix(media, "bad");
                tracing::warn!(
                    source = %media.display(),
                    target = %bad.display(),
                    "marking unprocessable source"
                );
                if let Err(rename_err) = std::fs::rename(media, &bad) {
                    tracing::warn!(error = %rename_err, "rename failed");
                }
            } else {
                tracing::warn!(source = %media.display(), "source will not be renamed");
            }
            return Err(e);
        }
    };

    write_index(&seek, &document)?;
    Ok(seek)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::StreamCapabilities;
    use crate::tests::fixtures::video;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingGenerator {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl IndexGenerator for CountingGenerator {
        fn process(&self, source: &Path) -> Result<IndexDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StreamError::UnsupportedSource(format!(
                    "unrecognized container: {}",
                    source.display()
                )));
            }
            Ok(IndexDocument {
                capabilities: StreamCapabilities::from_bytes(&b"caps"[..]),
                frames: vec![video(0, 4, 0)],
                sampling_rate_ms: 1000,
            })
        }
    }

    #[test]
    fn test_artifact_paths() {
        let media = Path::new("/media/movie.flv");
        assert_eq!(seek_path(media), Path::new("/media/movie.flv.seek"));
        assert_eq!(meta_path(media), Path::new("/media/movie.flv.meta"));
        assert_eq!(info_path(media), Path::new("/media/movie.flv.info"));
    }

    #[test]
    fn test_generates_once_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("clip.flv");
        std::fs::write(&media, b"payload").unwrap();

        let generator = CountingGenerator::new(false);
        let config = EngineConfig::default();

        let seek = ensure_index(&media, &generator, &config).unwrap();
        assert!(seek.exists());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        // second resolve finds the artifact, no new scan
        ensure_index(&media, &generator, &config).unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_external_generator_never_invoked() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("clip.flv");
        std::fs::write(&media, b"payload").unwrap();

        let generator = CountingGenerator::new(false);
        let config = EngineConfig {
            external_seek_generator: true,
            ..Default::default()
        };

        assert!(matches!(
            ensure_index(&media, &generator, &config),
            Err(StreamError::UnsupportedSource(_))
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rename_bad_files_policy() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("weird.bin");
        std::fs::write(&media, b"not media").unwrap();

        let generator = CountingGenerator::new(true);

        // without the policy the source stays put
        let config = EngineConfig::default();
        assert!(ensure_index(&media, &generator, &config).is_err());
        assert!(media.exists());

        // with it the source is marked .bad
        let config = EngineConfig {
            rename_bad_files: true,
            ..Default::default()
        };
        assert!(ensure_index(&media, &generator, &config).is_err());
        assert!(!media.exists());
        assert!(dir.path().join("weird.bin.bad").exists());
    }
}
