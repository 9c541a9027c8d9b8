//! Certificate readers: sources of [`CertificateBundle`]s.
//!
//! [`FileCertificateReader`] reads and parses a PEM bundle from disk on every call.
//! [`StaticCertificateReader`] serves an in-memory bundle and is mostly useful for tests and
//! for embedders that obtain the certificate by other means.

use crate::bundle::{BundleError, CertificateBundle};
use crate::error::ErrorKind;
use arc_swap::ArcSwap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An error that may arise reading a certificate bundle.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReadError {
    /// The bundle could not be opened or read.
    #[error("failed reading certificate bundle {}: {source}", path.display())]
    Io {
        /// Path of the bundle.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The bundle content could not be parsed.
    #[error("failed parsing certificate bundle {}: {source}", path.display())]
    Parse {
        /// Path of the bundle.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: BundleError,
    },
}

impl ReadError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
        }
    }
}

/// Capability to read a certificate chain and its private key.
///
/// Implementations must either return a fully parsed bundle or an error; there is no
/// partially valid result.
pub trait CertificateReader: Send + Sync + 'static {
    /// Reads the current certificate bundle.
    ///
    /// # Errors
    ///
    /// Returns a [`ReadError`] if the bundle cannot be read or parsed.
    fn read_certificate(&self) -> Result<Arc<CertificateBundle>, ReadError>;
}

/// Reads a PEM certificate bundle from a fixed path.
///
/// Every call re-reads the file; no state is kept between calls.
#[derive(Debug, Clone)]
pub struct FileCertificateReader {
    path: PathBuf,
}

impl FileCertificateReader {
    /// Creates a reader for the bundle at `path`. Does not touch the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path this reader reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CertificateReader for FileCertificateReader {
    fn read_certificate(&self) -> Result<Arc<CertificateBundle>, ReadError> {
        let bytes = std::fs::read(&self.path).map_err(|source| ReadError::Io {
            path: self.path.clone(),
            source,
        })?;

        let bundle = CertificateBundle::parse_pem(&bytes).map_err(|source| ReadError::Parse {
            path: self.path.clone(),
            source,
        })?;

        Ok(Arc::new(bundle))
    }
}

/// Serves an in-memory bundle that can be replaced at any time.
pub struct StaticCertificateReader {
    bundle: ArcSwap<CertificateBundle>,
}

impl StaticCertificateReader {
    /// Creates a reader serving `bundle`.
    pub fn new(bundle: Arc<CertificateBundle>) -> Self {
        Self {
            bundle: ArcSwap::from(bundle),
        }
    }

    /// Replaces the served bundle.
    pub fn set(&self, bundle: Arc<CertificateBundle>) {
        self.bundle.store(bundle);
    }
}

impl fmt::Debug for StaticCertificateReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCertificateReader")
            .field("bundle", &self.bundle.load())
            .finish()
    }
}

impl CertificateReader for StaticCertificateReader {
    fn read_certificate(&self) -> Result<Arc<CertificateBundle>, ReadError> {
        Ok(self.bundle.load_full())
    }
}

impl<R: CertificateReader + ?Sized> CertificateReader for Arc<R> {
    fn read_certificate(&self) -> Result<Arc<CertificateBundle>, ReadError> {
        (**self).read_certificate()
    }
}
