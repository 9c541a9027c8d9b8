//! Watching certificate reader: a cached, self-refreshing certificate bundle.
//!
//! [`WatchingCertificateReader`] loads a PEM bundle once during construction, then polls the
//! file and reloads it whenever its content changes. Readers always get the last bundle that
//! parsed successfully; a rotation that leaves a broken file behind is logged and ignored
//! until the file changes again.
//!
//! Use [`WatchingCertificateReader::updated`] to subscribe to rotations, and
//! [`WatchingCertificateReader::shutdown`] to stop the background task.
//!
//! # Example
//!
//! ```no_run
//! use fpa::WatchingCertificateReader;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cancel = CancellationToken::new();
//! let reader = WatchingCertificateReader::new(
//!     "/mnt/secrets/bundle.pem",
//!     Duration::from_secs(30 * 60),
//!     cancel.clone(),
//! )
//! .await?;
//!
//! let bundle = reader.bundle();
//! println!("serving certificate {}", bundle.serial_number());
//!
//! reader.shutdown_configured().await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod errors;
mod metrics;
mod source;

pub use builder::WatchingCertificateReaderBuilder;
pub use errors::{MetricsErrorKind, WatchingReaderError};
pub use metrics::MetricsRecorder;
pub use source::{BundleUpdates, WatchingCertificateReader};
