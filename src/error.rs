use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the streaming engine
#[derive(Error, Debug)]
pub enum StreamError {
    /// The seek index is malformed or truncated. Operator-actionable:
    /// the index artifacts must be deleted so they can be regenerated.
    #[error("corrupt seek index: {0}")]
    IndexCorrupt(String),

    /// The seek index capability block failed to decode
    #[error(
        "unable to decode stream capabilities; delete {} and {} so they can be regenerated",
        seek_path.display(),
        meta_path.display()
    )]
    CapabilitiesCorrupt {
        seek_path: PathBuf,
        meta_path: PathBuf,
    },

    /// A seek/read/open failure against the index or media file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The index generator collaborator cannot handle the source file
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// The output sink rejected a payload or completion signal
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Engine configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StreamError>;
