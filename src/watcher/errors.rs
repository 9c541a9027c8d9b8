use crate::error::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`FileWatcher`](super::FileWatcher).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FileWatcherError {
    /// The poll interval is zero.
    #[error("poll interval must be greater than zero")]
    InvalidInterval,

    /// The watched file could not be read when the watcher started.
    #[error("failed reading watched file {}: {source}", path.display())]
    Io {
        /// Path of the watched file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FileWatcherError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInterval => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
