#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! Rotating client-certificate credentials for a first-party (FPA) Azure AD application.
//!
//! The certificate of the first-party application is mounted into the pod by the
//! Kubernetes CSI secret-store driver and rotated out-of-band. This crate keeps serving
//! valid credentials across those rotations without a restart:
//!
//! - [`FileWatcher`] polls a file and fires a callback when its content hash changes.
//! - [`FileCertificateReader`] parses a PEM certificate chain and private key into a
//!   [`CertificateBundle`].
//! - [`WatchingCertificateReader`] caches the last good bundle and reloads it on change.
//! - [`CredentialRetriever`] mints a fresh [`ClientCertificateCredential`] from the cached
//!   bundle on every call.
//!
//! # Examples
//!
//! ```no_run
//! use fpa::{ClientOptions, CredentialRetriever, WatchingCertificateReader};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), fpa::Error> {
//! let cancel = CancellationToken::new();
//!
//! // Load the bundle once and keep watching it.
//! let reader = WatchingCertificateReader::new(
//!     "/mnt/secrets/fpa-bundle.pem",
//!     Duration::from_secs(30 * 60),
//!     cancel.clone(),
//! )
//! .await?;
//!
//! let retriever = CredentialRetriever::new("client-id", reader, ClientOptions::default())?;
//!
//! // Always built from the certificate cached right now.
//! let credential = retriever.retrieve_credential("tenant-id", &[])?;
//! let request = credential.token_request(&["https://management.azure.com/.default"], None)?;
//! println!("POST {}", request.endpoint());
//!
//! cancel.cancel();
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod cert;
pub mod clock;
pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod reader;
pub mod watcher;
pub mod watching_reader;

mod error_tracker;
mod observability;
mod prelude;

pub use bundle::{BundleError, CertificateBundle, SerialNumber};
pub use cert::{Certificate, PrivateKey};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, FirstPartyConfig};
pub use credential::{
    ClientCertificateCredential, ClientOptions, CredentialError, CredentialRetriever,
    FirstPartyCredentialRetriever, TokenRequest,
};
pub use error::{Error, ErrorKind};
pub use reader::{CertificateReader, FileCertificateReader, ReadError, StaticCertificateReader};
pub use watcher::{FileWatcher, FileWatcherError};
pub use watching_reader::{
    BundleUpdates, WatchingCertificateReader, WatchingCertificateReaderBuilder,
    WatchingReaderError,
};
