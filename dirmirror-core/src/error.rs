use dirmirror_scanner::ScanError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("cannot create destination root {}: {source}", path.display())]
    DestinationRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is outside the mirrored prefix")]
    OutsidePrefix(String),

    #[error("{0} does not map to a safe local path")]
    UnsafePath(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl MirrorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }

    /// Only network-level failures are worth another download attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MirrorError::Scan(e) if e.is_network())
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
