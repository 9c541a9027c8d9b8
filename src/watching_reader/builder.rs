use super::errors::WatchingReaderError;
use super::metrics::MetricsRecorder;
use super::source::WatchingCertificateReader;
use crate::constants::DEFAULT_POLL_INTERVAL;
use crate::reader::CertificateReader;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`WatchingCertificateReader`].
///
/// # Example
///
/// ```no_run
/// use fpa::WatchingCertificateReader;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cancel = CancellationToken::new();
/// let reader = WatchingCertificateReader::builder("/mnt/secrets/bundle.pem")
///     .poll_interval(Duration::from_secs(60))
///     .cancellation_token(cancel.clone())
///     .shutdown_timeout(Some(Duration::from_secs(5)))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct WatchingCertificateReaderBuilder {
    path: PathBuf,
    poll_interval: Duration,
    cancel: Option<CancellationToken>,
    reader: Option<Arc<dyn CertificateReader>>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
    shutdown_timeout: Option<Duration>,
}

impl Debug for WatchingCertificateReaderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchingCertificateReaderBuilder")
            .field("path", &self.path)
            .field("poll_interval", &self.poll_interval)
            .field("cancel", &self.cancel)
            .field("reader", &self.reader.as_ref().map(|_| "<CertificateReader>"))
            .field(
                "metrics",
                &self.metrics.as_ref().map(|_| "<MetricsRecorder>"),
            )
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl WatchingCertificateReaderBuilder {
    /// Creates a builder watching the bundle at `path`.
    ///
    /// Defaults: 30 minute poll interval, a fresh cancellation token, a
    /// [`FileCertificateReader`](crate::FileCertificateReader) on `path`, no metrics and a 30
    /// second shutdown timeout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: None,
            reader: None,
            metrics: None,
            shutdown_timeout: Some(DEFAULT_SHUTDOWN_TIMEOUT),
        }
    }

    /// Sets how often the file content is checked for changes.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Ties the background watcher to `cancel`.
    ///
    /// The reader uses a child token: cancelling `cancel` stops the watcher, while shutting
    /// down the reader leaves `cancel` untouched.
    #[must_use]
    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Replaces the reader used to load the bundle.
    ///
    /// The watched path still decides *when* a reload happens; `reader` decides *what* is
    /// loaded.
    #[must_use]
    pub fn reader<R>(mut self, reader: R) -> Self
    where
        R: CertificateReader,
    {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// Sets a metrics recorder.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the timeout used by
    /// [`WatchingCertificateReader::shutdown_configured`]. `None` waits indefinitely.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Loads the bundle once and starts watching for changes.
    ///
    /// # Errors
    ///
    /// - [`WatchingReaderError::InvalidPollInterval`] if the poll interval is zero.
    /// - [`WatchingReaderError::Read`] if the initial load fails.
    /// - [`WatchingReaderError::Watch`] if the watched file cannot be read.
    pub async fn build(self) -> Result<WatchingCertificateReader, WatchingReaderError> {
        if self.poll_interval.is_zero() {
            return Err(WatchingReaderError::InvalidPollInterval);
        }

        WatchingCertificateReader::build_with(
            self.path,
            self.poll_interval,
            self.cancel.unwrap_or_default(),
            self.reader,
            self.metrics,
            self.shutdown_timeout,
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder_defaults() {
        let builder = WatchingCertificateReaderBuilder::new("bundle.pem");

        assert_eq!(builder.poll_interval, Duration::from_secs(30 * 60));
        assert_eq!(builder.shutdown_timeout, Some(Duration::from_secs(30)));
        assert!(builder.cancel.is_none());
        assert!(builder.reader.is_none());
    }

    #[tokio::test]
    async fn test_zero_poll_interval_is_rejected_before_io() {
        let err = WatchingCertificateReaderBuilder::new("/nonexistent/bundle.pem")
            .poll_interval(Duration::ZERO)
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, WatchingReaderError::InvalidPollInterval));
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
