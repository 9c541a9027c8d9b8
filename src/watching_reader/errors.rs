use crate::error::ErrorKind;
use crate::reader::ReadError;
use crate::watcher::FileWatcherError;
use std::fmt;
use thiserror::Error;

/// Errors returned by [`WatchingCertificateReader`](super::WatchingCertificateReader).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchingReaderError {
    /// The poll interval is zero.
    #[error("poll interval must be greater than zero")]
    InvalidPollInterval,

    /// The initial load of the certificate bundle failed.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The file watcher could not be started.
    #[error(transparent)]
    Watch(#[from] FileWatcherError),

    /// The reader was shut down and no further updates will be delivered.
    #[error("watching certificate reader is closed")]
    Closed,

    /// Graceful shutdown did not complete in time; the watcher task was aborted.
    #[error("shutdown timeout exceeded")]
    ShutdownTimeout,
}

impl WatchingReaderError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPollInterval => ErrorKind::Config,
            Self::Read(e) => e.kind(),
            Self::Watch(e) => e.kind(),
            Self::Closed | Self::ShutdownTimeout => ErrorKind::Closed,
        }
    }
}

/// Structured error kind recorded through a [`MetricsRecorder`](super::MetricsRecorder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MetricsErrorKind {
    /// The bundle could not be loaded during construction.
    InitialLoadFailed,
    /// A background reload failed because the bundle could not be read.
    ReloadIo,
    /// A background reload failed because the bundle could not be parsed.
    ReloadParse,
    /// Failed to join the watcher task during shutdown.
    WatcherJoinFailed,
}

impl MetricsErrorKind {
    /// Returns a string representation of the error kind.
    ///
    /// This is useful for metrics systems that require string labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialLoadFailed => "initial_load_failed",
            Self::ReloadIo => "reload_io",
            Self::ReloadParse => "reload_parse",
            Self::WatcherJoinFailed => "watcher_join_failed",
        }
    }
}

impl fmt::Display for MetricsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
