//! Environment-driven configuration of the first-party application identity.
//!
//! ```no_run
//! use fpa::FirstPartyConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), fpa::Error> {
//! let cancel = CancellationToken::new();
//! let retriever = FirstPartyConfig::from_env()?.build(cancel.clone()).await?;
//! let credential = retriever.retrieve_credential("72f988bf-86f1-41af-91ab-2d7cd011db47", &[])?;
//! # Ok(())
//! # }
//! ```

use crate::constants::{
    DEFAULT_POLL_INTERVAL, FPA_CERT_BUNDLE_PATH_ENV, FPA_CERT_POLL_INTERVAL_ENV,
    FPA_CLIENT_ID_ENV,
};
use crate::credential::{ClientOptions, CredentialRetriever};
use crate::error::{Error, ErrorKind};
use crate::watching_reader::WatchingCertificateReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Errors returned while loading a [`FirstPartyConfig`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A required variable is set but blank.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// The poll interval is not a positive whole number of seconds.
    #[error("FPA_CERT_POLL_INTERVAL_SECS must be a positive number of seconds, got {0:?}")]
    InvalidPollInterval(String),
}

impl ConfigError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

/// Where the first-party certificate lives and which application it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstPartyConfig {
    cert_bundle_path: PathBuf,
    client_id: String,
    poll_interval: Duration,
}

impl FirstPartyConfig {
    /// Creates a configuration with the default poll interval.
    pub fn new(cert_bundle_path: impl Into<PathBuf>, client_id: impl Into<String>) -> Self {
        Self {
            cert_bundle_path: cert_bundle_path.into(),
            client_id: client_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Reads `FPA_CERT_BUNDLE_PATH`, `FPA_CLIENT_ID` and the optional
    /// `FPA_CERT_POLL_INTERVAL_SECS` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or blank, or if the poll
    /// interval is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`FirstPartyConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`FirstPartyConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cert_bundle_path = required(&lookup, FPA_CERT_BUNDLE_PATH_ENV)?;
        let client_id = required(&lookup, FPA_CLIENT_ID_ENV)?;

        let poll_interval = match lookup(FPA_CERT_POLL_INTERVAL_ENV) {
            None => DEFAULT_POLL_INTERVAL,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidPollInterval(raw)),
            },
        };

        Ok(Self {
            cert_bundle_path: PathBuf::from(cert_bundle_path),
            client_id,
            poll_interval,
        })
    }

    /// Returns the path of the PEM certificate bundle.
    pub fn cert_bundle_path(&self) -> &Path {
        &self.cert_bundle_path
    }

    /// Returns the application (client) ID.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Loads the certificate, starts watching it and returns a retriever using default
    /// client options.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the watching reader cannot be built or the client ID is blank.
    pub async fn build(&self, cancel: CancellationToken) -> Result<CredentialRetriever, Error> {
        self.build_with_options(cancel, ClientOptions::default()).await
    }

    /// Like [`FirstPartyConfig::build`], with explicit client options.
    ///
    /// # Errors
    ///
    /// See [`FirstPartyConfig::build`].
    pub async fn build_with_options(
        &self,
        cancel: CancellationToken,
        options: ClientOptions,
    ) -> Result<CredentialRetriever, Error> {
        let reader = WatchingCertificateReader::new(
            self.cert_bundle_path.clone(),
            self.poll_interval,
            cancel,
        )
        .await?;

        Ok(CredentialRetriever::new(
            self.client_id.clone(),
            reader,
            options,
        )?)
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name).ok_or(ConfigError::Missing(name))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(name));
    }
    Ok(value)
}
