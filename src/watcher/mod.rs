//! Polling file-change detection.
//!
//! [`FileWatcher`] hashes the full content of a single file at a fixed interval and invokes a
//! callback once per observed change. It never relies on filesystem event notifications: the
//! files it is meant for live on CSI-backed volumes that are rotated through symlink swaps,
//! where event delivery inside a container is unreliable.
//!
//! ```no_run
//! use fpa::watcher::FileWatcher;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cancel = CancellationToken::new();
//! let watcher = FileWatcher::new("/mnt/secrets/bundle.pem", Duration::from_secs(60), || async {
//!     println!("bundle changed");
//!     Ok::<(), std::io::Error>(())
//! })?;
//! let handle = watcher.start(cancel.clone()).await?;
//!
//! cancel.cancel();
//! handle.await?;
//! # Ok(())
//! # }
//! ```

mod errors;

pub use errors::FileWatcherError;

use crate::error_tracker::{ErrorKey, ErrorTracker, MAX_CONSECUTIVE_SAME_ERROR};
use crate::prelude::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// SHA-256 digest of a file's full content.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Computes the hash of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Returns the digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentHash(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        f.write_str("..)")
    }
}

/// Computes the content hash of the file at `path`.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be opened or read.
pub async fn hash_file(path: &Path) -> std::io::Result<ContentHash> {
    let bytes = tokio::fs::read(path).await?;
    Ok(ContentHash::of(&bytes))
}

/// Polls a file and invokes a callback whenever its content changes.
///
/// The callback returns a future that is awaited on the watcher's own task, inline with
/// polling: a slow callback delays the next check but never causes a change to be skipped, and
/// two changes observed on two different ticks always produce two invocations. Callbacks that
/// block should move that work off the runtime, e.g. with `tokio::task::spawn_blocking`.
pub struct FileWatcher<F> {
    path: PathBuf,
    interval: Duration,
    on_change: F,
}

impl<F> fmt::Debug for FileWatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWatcher")
            .field("path", &self.path)
            .field("interval", &self.interval)
            .field("on_change", &"<callback>")
            .finish()
    }
}

impl<F, Fut, E> FileWatcher<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Creates a watcher. Does not touch the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`FileWatcherError::InvalidInterval`] if `interval` is zero.
    pub fn new(
        path: impl Into<PathBuf>,
        interval: Duration,
        on_change: F,
    ) -> Result<Self, FileWatcherError> {
        if interval.is_zero() {
            return Err(FileWatcherError::InvalidInterval);
        }
        Ok(Self {
            path: path.into(),
            interval,
            on_change,
        })
    }

    /// Returns the watched path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Hashes the file once and spawns the poll loop on the current tokio runtime.
    ///
    /// The loop runs until `cancel` is cancelled. Cancellation is only observed between
    /// ticks, so a check that is already running always completes.
    ///
    /// # Errors
    ///
    /// Returns [`FileWatcherError::Io`] if the file cannot be read; nothing is spawned.
    pub async fn start(self, cancel: CancellationToken) -> Result<JoinHandle<()>, FileWatcherError> {
        let initial = hash_file(&self.path)
            .await
            .map_err(|source| FileWatcherError::Io {
                path: self.path.clone(),
                source,
            })?;

        Ok(self.start_from(initial, cancel))
    }

    /// Spawns the poll loop comparing against `baseline` instead of hashing the file first.
    ///
    /// Callers that load the file themselves hash it *before* loading, so that a change landing
    /// in between is reported on the first tick rather than absorbed into the baseline.
    pub fn start_from(self, baseline: ContentHash, cancel: CancellationToken) -> JoinHandle<()> {
        let state = WatchState::new(self.path, self.interval, baseline, self.on_change);
        info!(
            "Watching file for changes: path={}, interval_ms={}",
            state.path.display(),
            state.interval.as_millis()
        );

        tokio::spawn(state.run(cancel))
    }
}

/// Result of a single content check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    /// The content hash matches the stored one.
    Unchanged,
    /// The content changed and the callback succeeded.
    Changed,
    /// The content changed and the callback returned an error.
    CallbackFailed,
    /// The file could not be read; nothing changed.
    ReadFailed,
}

/// Mutable state of a running watcher. Owned exclusively by the poll task.
pub(crate) struct WatchState<F> {
    path: PathBuf,
    interval: Duration,
    last_hash: ContentHash,
    on_change: F,
    errors: ErrorTracker,
}

impl<F, Fut, E> WatchState<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    pub(crate) fn new(path: PathBuf, interval: Duration, initial: ContentHash, on_change: F) -> Self {
        Self {
            path,
            interval,
            last_hash: initial,
            on_change,
            errors: ErrorTracker::new(MAX_CONSECUTIVE_SAME_ERROR),
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Cancellation signal received; stopping file watcher: path={}", self.path.display());
                    return;
                }
                _ = ticker.tick() => {}
            }

            self.poll_once().await;
        }
    }

    /// Re-hashes the file and invokes the callback if the content changed.
    ///
    /// The stored hash is updated before the callback runs, so a failing callback is not
    /// invoked again until the content changes once more.
    pub(crate) async fn poll_once(&mut self) -> PollOutcome {
        let hash = match hash_file(&self.path).await {
            Ok(hash) => hash,
            Err(e) => {
                if self.errors.record_error(ErrorKey::WatchRead) {
                    warn!(
                        "Failed to read watched file; keeping previous state: path={}, error={}",
                        self.path.display(),
                        e
                    );
                } else {
                    debug!(
                        "Failed to read watched file (repeated): path={}, error={}, consecutive_failures={}",
                        self.path.display(),
                        e,
                        self.errors.consecutive_count()
                    );
                }
                return PollOutcome::ReadFailed;
            }
        };

        if self.errors.last_error_kind() == Some(ErrorKey::WatchRead) {
            info!(
                "Watched file readable again after {} consecutive failures: path={}",
                self.errors.consecutive_count(),
                self.path.display()
            );
            self.errors.reset();
        }

        if hash == self.last_hash {
            return PollOutcome::Unchanged;
        }

        debug!(
            "Watched file content changed: path={}, hash={:?}",
            self.path.display(),
            hash
        );
        self.last_hash = hash;

        match (self.on_change)().await {
            Ok(()) => {
                self.errors.reset();
                PollOutcome::Changed
            }
            Err(e) => {
                if self.errors.record_error(ErrorKey::WatchCallback) {
                    warn!(
                        "File change callback failed; waiting for the next content change: path={}, error={}",
                        self.path.display(),
                        e
                    );
                } else {
                    debug!(
                        "File change callback failed (repeated): path={}, error={}, consecutive_failures={}",
                        self.path.display(),
                        e,
                        self.errors.consecutive_count()
                    );
                }
                PollOutcome::CallbackFailed
            }
        }
    }
}
