//! Crate-level error classification and the aggregate [`Error`] type.

use crate::config::ConfigError;
use crate::credential::CredentialError;
use crate::reader::ReadError;
use crate::watcher::FileWatcherError;
use crate::watching_reader::WatchingReaderError;
use std::fmt;
use thiserror::Error;

/// Coarse classification of every error surfaced by this crate.
///
/// Construction-time failures are always one of these kinds; callers that only
/// need to decide between "fix your configuration" and "the bundle on disk is
/// unusable" can match on the kind instead of the concrete error.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Invalid construction arguments or configuration.
    Config,
    /// The certificate bundle could not be opened or read.
    Io,
    /// The certificate bundle could not be parsed.
    Parse,
    /// The credential could not be constructed from the inputs.
    Credential,
    /// The watching reader has been shut down or did not stop in time.
    Closed,
}

impl ErrorKind {
    /// Returns a stable string representation of the error kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Io => "io",
            Self::Parse => "parse",
            Self::Credential => "credential",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate error for application code wiring the whole lifecycle together.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The certificate bundle could not be read or parsed.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The file watcher could not be created or started.
    #[error(transparent)]
    Watch(#[from] FileWatcherError),

    /// The watching reader could not be built or shut down.
    #[error(transparent)]
    WatchingReader(#[from] WatchingReaderError),

    /// A credential could not be constructed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl Error {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Read(e) => e.kind(),
            Self::Watch(e) => e.kind(),
            Self::WatchingReader(e) => e.kind(),
            Self::Credential(e) => e.kind(),
        }
    }
}
