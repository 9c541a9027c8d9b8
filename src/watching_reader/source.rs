use super::builder::WatchingCertificateReaderBuilder;
use super::errors::{MetricsErrorKind, WatchingReaderError};
use super::metrics::MetricsRecorder;
use crate::bundle::CertificateBundle;
use crate::error::ErrorKind;
use crate::prelude::{debug, info, warn};
use crate::reader::{CertificateReader, FileCertificateReader, ReadError};
use crate::watcher::{hash_file, FileWatcher, FileWatcherError};
use arc_swap::ArcSwap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle for receiving update notifications from a [`WatchingCertificateReader`].
///
/// Cloning this handle creates another receiver that shares the same update
/// stream. Each receiver observes the latest sequence number; if a receiver
/// is slow to consume updates, intermediate sequence numbers may be skipped
/// (this is the standard behavior of `watch` channels).
///
/// # Examples
///
/// ```no_run
/// # use fpa::WatchingCertificateReader;
/// # use std::time::Duration;
/// # use tokio_util::sync::CancellationToken;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let reader = WatchingCertificateReader::new(
///     "/mnt/secrets/bundle.pem",
///     Duration::from_secs(60),
///     CancellationToken::new(),
/// )
/// .await?;
/// let mut updates = reader.updated();
///
/// updates.changed().await?;
/// println!("rotated to serial {}", reader.bundle().serial_number());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct BundleUpdates {
    rx: watch::Receiver<u64>,
}

impl BundleUpdates {
    /// Waits for the next published bundle and returns the new sequence number.
    ///
    /// The initial load does not trigger a notification; only later reloads are notified.
    ///
    /// # Errors
    ///
    /// Returns [`WatchingReaderError::Closed`] once every reader handle has been dropped.
    pub async fn changed(&mut self) -> Result<u64, WatchingReaderError> {
        self.rx
            .changed()
            .await
            .map_err(|_| WatchingReaderError::Closed)?;
        Ok(*self.rx.borrow())
    }

    /// Returns the last sequence number without waiting.
    pub fn last(&self) -> u64 {
        *self.rx.borrow()
    }

    /// Waits for the sequence number to satisfy a predicate.
    ///
    /// Returns immediately if the current sequence number already satisfies `f`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchingReaderError::Closed`] once every reader handle has been dropped.
    pub async fn wait_for<F>(&mut self, mut f: F) -> Result<u64, WatchingReaderError>
    where
        F: FnMut(&u64) -> bool,
    {
        let current = self.last();
        if f(&current) {
            return Ok(current);
        }
        loop {
            let seq = self.changed().await?;
            if f(&seq) {
                return Ok(seq);
            }
        }
    }
}

/// A [`CertificateReader`] that caches the last good bundle and reloads it whenever the
/// file on disk changes.
///
/// Construction loads the bundle once and fails if that load fails. Afterwards a
/// [`FileWatcher`] polls the file and every observed change triggers a reload:
///
/// - a successful reload atomically replaces the cached bundle;
/// - a failed reload is logged and the previous bundle keeps being served.
///
/// [`WatchingCertificateReader::bundle`] never performs I/O and never fails. Concurrent
/// callers observe either the bundle before a reload or the one after it, never a mix.
///
/// Cloning is cheap and all clones share the same cache. Dropping the last clone stops the
/// background watcher.
#[derive(Clone, Debug)]
pub struct WatchingCertificateReader {
    inner: Arc<Inner>,
}

struct Inner {
    // Atomically replaced, last-known-good bundle.
    bundle: ArcSwap<CertificateBundle>,

    path: PathBuf,
    poll_interval: Duration,
    reader: Arc<dyn CertificateReader>,
    metrics: Option<Arc<dyn MetricsRecorder>>,

    // Lifecycle / shutdown.
    closed: AtomicBool,
    cancel: CancellationToken,
    shutdown_timeout: Option<Duration>,

    // Update notifications (monotonic sequence).
    update_seq: AtomicU64,
    update_tx: watch::Sender<u64>,
    update_rx: watch::Receiver<u64>,

    // Held from read to store, so reloads never overtake each other.
    reload_lock: Mutex<()>,

    // Watcher task handle (joined/aborted at shutdown).
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchingCertificateReader")
            .field("bundle", &self.bundle.load())
            .field("path", &self.path)
            .field("poll_interval", &self.poll_interval)
            .field("reader", &"<CertificateReader>")
            .field(
                "metrics",
                &self.metrics.as_ref().map(|_| "<MetricsRecorder>"),
            )
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("cancel", &self.cancel)
            .field("update_seq", &self.update_seq)
            .field("watcher", &"<Mutex<Option<JoinHandle<()>>>>")
            .finish()
    }
}

impl WatchingCertificateReader {
    /// Loads the bundle at `path` and starts watching it every `poll_interval` until `cancel`
    /// is cancelled.
    ///
    /// Equivalent to
    /// `WatchingCertificateReader::builder(path).poll_interval(poll_interval).cancellation_token(cancel).build()`.
    ///
    /// # Errors
    ///
    /// Returns a [`WatchingReaderError`] if the poll interval is zero or the initial load
    /// fails. No background task is left running on error.
    pub async fn new(
        path: impl Into<PathBuf>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, WatchingReaderError> {
        WatchingCertificateReaderBuilder::new(path)
            .poll_interval(poll_interval)
            .cancellation_token(cancel)
            .build()
            .await
    }

    /// Creates a builder for configuring a [`WatchingCertificateReader`].
    pub fn builder(path: impl Into<PathBuf>) -> WatchingCertificateReaderBuilder {
        WatchingCertificateReaderBuilder::new(path)
    }

    /// Returns the cached bundle.
    pub fn bundle(&self) -> Arc<CertificateBundle> {
        self.inner.bundle.load_full()
    }

    /// Returns the start of the validity period of the cached leaf certificate.
    pub fn not_before(&self) -> OffsetDateTime {
        self.inner.bundle.load().not_before()
    }

    /// Returns the watched path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Returns a handle for receiving update notifications.
    ///
    /// The initial sequence number is 0 and each successful reload increments it by one.
    pub fn updated(&self) -> BundleUpdates {
        BundleUpdates {
            rx: self.inner.update_rx.clone(),
        }
    }

    /// Returns `true` while the background watcher is expected to pick up changes.
    ///
    /// Becomes `false` once the reader is shut down or its cancellation token fires.
    pub fn is_watching(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire) && !self.inner.cancel.is_cancelled()
    }

    /// Reloads the bundle immediately, outside the poll schedule.
    ///
    /// On failure the cached bundle is left untouched. Reloads are serialized with the ones
    /// triggered by the watcher, and the read runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`WatchingReaderError::Read`] with the error of the underlying reader.
    pub async fn reload(&self) -> Result<(), WatchingReaderError> {
        self.inner.reload().await
    }

    /// Cancels the background watcher and waits for it to stop.
    ///
    /// This method is idempotent. The cached bundle stays readable afterwards; it is simply
    /// no longer refreshed.
    ///
    /// **Note:** This method may wait indefinitely if the watcher is stuck in a reload. Prefer
    /// [`WatchingCertificateReader::shutdown_with_timeout`] or
    /// [`WatchingCertificateReader::shutdown_configured`].
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.watcher.lock().await.take() {
            if let Err(_e) = handle.await {
                warn!("Error joining watcher task during shutdown: error={}", _e);
                self.inner.record_error(MetricsErrorKind::WatcherJoinFailed);
            }
        }
    }

    /// Cancels the background watcher and waits up to `timeout` for it to stop, aborting it
    /// afterwards.
    ///
    /// This method is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`WatchingReaderError::ShutdownTimeout`] if the watcher had to be aborted.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<(), WatchingReaderError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.cancel.cancel();

        let Some(mut handle) = self.inner.watcher.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_e)) => {
                warn!("Error joining watcher task during shutdown: error={}", _e);
                self.inner.record_error(MetricsErrorKind::WatcherJoinFailed);
                Ok(())
            }
            Err(_) => {
                warn!("Shutdown timeout exceeded; aborting watcher task");
                handle.abort();
                let _ = handle.await;
                Err(WatchingReaderError::ShutdownTimeout)
            }
        }
    }

    /// Shuts down using the timeout configured in the builder (30 seconds unless changed).
    ///
    /// # Errors
    ///
    /// Returns [`WatchingReaderError::ShutdownTimeout`] if the configured timeout is exceeded.
    pub async fn shutdown_configured(&self) -> Result<(), WatchingReaderError> {
        if let Some(timeout) = self.inner.shutdown_timeout {
            self.shutdown_with_timeout(timeout).await
        } else {
            self.shutdown().await;
            Ok(())
        }
    }

    pub(super) async fn build_with(
        path: PathBuf,
        poll_interval: Duration,
        parent: CancellationToken,
        reader: Option<Arc<dyn CertificateReader>>,
        metrics: Option<Arc<dyn MetricsRecorder>>,
        shutdown_timeout: Option<Duration>,
    ) -> Result<Self, WatchingReaderError> {
        let reader: Arc<dyn CertificateReader> =
            reader.unwrap_or_else(|| Arc::new(FileCertificateReader::new(path.clone())));

        // Hashed before loading: a rotation landing in between shows up on the first tick.
        let baseline = hash_file(&path).await;

        let initial = match read_blocking(&reader).await {
            Ok(bundle) => bundle,
            Err(e) => {
                if let Some(metrics) = metrics.as_deref() {
                    metrics.record_error(MetricsErrorKind::InitialLoadFailed);
                }
                return Err(e);
            }
        };
        let baseline = baseline.map_err(|source| FileWatcherError::Io {
            path: path.clone(),
            source,
        })?;
        info!(
            "Loaded certificate bundle: path={}, serial={}, not_before={}, not_after={}",
            path.display(),
            initial.serial_number(),
            initial.not_before(),
            initial.not_after()
        );

        let (update_tx, update_rx) = watch::channel(0u64);
        let inner = Arc::new(Inner {
            bundle: ArcSwap::from(initial),
            path,
            poll_interval,
            reader,
            metrics,
            closed: AtomicBool::new(false),
            cancel: parent.child_token(),
            shutdown_timeout,
            update_seq: AtomicU64::new(0),
            update_tx,
            update_rx,
            reload_lock: Mutex::new(()),
            watcher: Mutex::new(None),
        });

        // The watcher task must not keep the cache alive; dropping the last reader cancels it.
        let weak = Arc::downgrade(&inner);
        let watcher = FileWatcher::new(inner.path.clone(), poll_interval, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.reload().await,
                    None => Ok(()),
                }
            }
        })?;
        let handle = watcher.start_from(baseline, inner.cancel.clone());

        *inner.watcher.lock().await = Some(handle);

        Ok(Self { inner })
    }

    /// Test-only constructor serving `initial` without spawning a watcher.
    #[cfg(test)]
    pub(super) fn new_for_test(
        initial: Arc<CertificateBundle>,
        reader: Arc<dyn CertificateReader>,
        metrics: Option<Arc<dyn MetricsRecorder>>,
    ) -> Self {
        let (update_tx, update_rx) = watch::channel(0u64);
        let inner = Inner {
            bundle: ArcSwap::from(initial),
            path: PathBuf::from("memory"),
            poll_interval: Duration::from_secs(1),
            reader,
            metrics,
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            shutdown_timeout: None,
            update_seq: AtomicU64::new(0),
            update_tx,
            update_rx,
            reload_lock: Mutex::new(()),
            watcher: Mutex::new(None),
        };

        Self {
            inner: Arc::new(inner),
        }
    }
}

impl Inner {
    fn record_error(&self, kind: MetricsErrorKind) {
        if let Some(metrics) = self.metrics.as_deref() {
            metrics.record_error(kind);
        }
    }

    fn record_reload(&self) {
        if let Some(metrics) = self.metrics.as_deref() {
            metrics.record_reload();
        }
    }

    async fn reload(&self) -> Result<(), WatchingReaderError> {
        let _guard = self.reload_lock.lock().await;

        match read_blocking(&self.reader).await {
            Ok(bundle) => {
                info!(
                    "Reloaded certificate bundle: path={}, serial={}, not_before={}, not_after={}",
                    self.path.display(),
                    bundle.serial_number(),
                    bundle.not_before(),
                    bundle.not_after()
                );
                self.bundle.store(bundle);
                self.record_reload();
                self.notify_update();
                Ok(())
            }
            Err(e) => {
                debug!(
                    "Reload failed; keeping previous bundle: path={}, kind={}",
                    self.path.display(),
                    e.kind()
                );
                match e.kind() {
                    ErrorKind::Io => self.record_error(MetricsErrorKind::ReloadIo),
                    ErrorKind::Parse => self.record_error(MetricsErrorKind::ReloadParse),
                    _ => {}
                }
                Err(e)
            }
        }
    }

    fn notify_update(&self) {
        let next = self.update_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.update_tx.send(next);
    }
}

/// Runs `reader` on the blocking thread pool; readers are free to do synchronous I/O.
async fn read_blocking(
    reader: &Arc<dyn CertificateReader>,
) -> Result<Arc<CertificateBundle>, WatchingReaderError> {
    let reader = Arc::clone(reader);
    match tokio::task::spawn_blocking(move || reader.read_certificate()).await {
        Ok(result) => Ok(result?),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        // The runtime is shutting down.
        Err(_) => Err(WatchingReaderError::Closed),
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Best-effort cancellation. Do not block in Drop.
        self.cancel.cancel();
    }
}

impl CertificateReader for WatchingCertificateReader {
    fn read_certificate(&self) -> Result<Arc<CertificateBundle>, ReadError> {
        Ok(self.bundle())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::reader::StaticCertificateReader;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct CountingMetrics {
        reloads: AtomicU64,
        errors: StdMutex<HashMap<MetricsErrorKind, u64>>,
    }

    impl MetricsRecorder for CountingMetrics {
        fn record_reload(&self) {
            self.reloads.fetch_add(1, Ordering::Relaxed);
        }

        fn record_error(&self, kind: MetricsErrorKind) {
            *self.errors.lock().unwrap().entry(kind).or_insert(0) += 1;
        }
    }

    impl CountingMetrics {
        fn errors(&self, kind: MetricsErrorKind) -> u64 {
            self.errors.lock().unwrap().get(&kind).copied().unwrap_or(0)
        }
    }

    struct FailingReader(ErrorKind);

    impl CertificateReader for FailingReader {
        fn read_certificate(&self) -> Result<Arc<CertificateBundle>, ReadError> {
            let path = PathBuf::from("memory");
            Err(match self.0 {
                ErrorKind::Io => ReadError::Io {
                    path,
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                },
                _ => ReadError::Parse {
                    path,
                    source: crate::bundle::BundleError::EmptyChain,
                },
            })
        }
    }

    fn bundle(serial: u64) -> Arc<CertificateBundle> {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(vec!["fpa.example".to_string()]).unwrap();
        params.serial_number = Some(serial.into());
        let cert = params.self_signed(&key_pair).unwrap();
        let pem = format!("{}{}", cert.pem(), key_pair.serialize_pem());
        Arc::new(CertificateBundle::parse_pem(pem.as_bytes()).unwrap())
    }

    /// Serves `bundles` in order; the first read blocks its thread until `open` is called.
    struct GatedReader {
        calls: AtomicU64,
        bundles: Vec<Arc<CertificateBundle>>,
        gate: StdMutex<std::sync::mpsc::Receiver<()>>,
    }

    impl GatedReader {
        fn new(bundles: Vec<Arc<CertificateBundle>>) -> (Self, std::sync::mpsc::Sender<()>) {
            let (tx, rx) = std::sync::mpsc::channel();
            let reader = Self {
                calls: AtomicU64::new(0),
                bundles,
                gate: StdMutex::new(rx),
            };
            (reader, tx)
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CertificateReader for GatedReader {
        fn read_certificate(&self) -> Result<Arc<CertificateBundle>, ReadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                let _ = self.gate.lock().unwrap().recv();
            }
            let index = usize::try_from(call).unwrap().min(self.bundles.len() - 1);
            Ok(Arc::clone(&self.bundles[index]))
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_reload_read_does_not_block_the_runtime() {
        let (source, open) = GatedReader::new(vec![bundle(2)]);
        let source = Arc::new(source);
        let reader = WatchingCertificateReader::new_for_test(bundle(1), source.clone(), None);

        let reloading = tokio::spawn({
            let reader = reader.clone();
            async move { reader.reload().await }
        });

        // On a current-thread runtime this only progresses if the read left the runtime thread.
        wait_until(|| source.calls() == 1).await;
        assert_eq!(reader.bundle().serial_number().to_u64(), Some(1));

        open.send(()).unwrap();
        reloading.await.unwrap().unwrap();
        assert_eq!(reader.bundle().serial_number().to_u64(), Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_reloads_never_move_backwards() {
        let (source, open) = GatedReader::new(vec![bundle(11), bundle(12)]);
        let source = Arc::new(source);
        let reader = WatchingCertificateReader::new_for_test(bundle(10), source.clone(), None);

        let first = tokio::spawn({
            let reader = reader.clone();
            async move { reader.reload().await }
        });
        wait_until(|| source.calls() == 1).await;

        let second = tokio::spawn({
            let reader = reader.clone();
            async move { reader.reload().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Queued behind the first reload instead of reading the newer bundle.
        assert_eq!(source.calls(), 1);

        open.send(()).unwrap();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(reader.bundle().serial_number().to_u64(), Some(12));
        assert_eq!(reader.updated().last(), 2);
    }

    #[tokio::test]
    async fn test_reload_swaps_bundle_and_notifies() {
        let source = Arc::new(StaticCertificateReader::new(bundle(1)));
        let metrics = Arc::new(CountingMetrics::default());
        let reader = WatchingCertificateReader::new_for_test(
            bundle(1),
            source.clone(),
            Some(metrics.clone()),
        );
        let mut updates = reader.updated();
        assert_eq!(updates.last(), 0);

        source.set(bundle(2));
        reader.reload().await.unwrap();

        assert_eq!(updates.changed().await.unwrap(), 1);
        assert_eq!(reader.bundle().serial_number().to_u64(), Some(2));
        assert_eq!(metrics.reloads.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_bundle() {
        let metrics = Arc::new(CountingMetrics::default());
        let initial = bundle(7);
        let reader = WatchingCertificateReader::new_for_test(
            Arc::clone(&initial),
            Arc::new(FailingReader(ErrorKind::Parse)),
            Some(metrics.clone()),
        );

        let err = reader.reload().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(Arc::ptr_eq(&reader.bundle(), &initial));
        assert_eq!(reader.updated().last(), 0);
        assert_eq!(metrics.errors(MetricsErrorKind::ReloadParse), 1);
        assert_eq!(metrics.reloads.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_failed_reload_io_is_recorded_as_io() {
        let metrics = Arc::new(CountingMetrics::default());
        let reader = WatchingCertificateReader::new_for_test(
            bundle(7),
            Arc::new(FailingReader(ErrorKind::Io)),
            Some(metrics.clone()),
        );

        reader.reload().await.unwrap_err();
        assert_eq!(metrics.errors(MetricsErrorKind::ReloadIo), 1);
        assert_eq!(metrics.errors(MetricsErrorKind::ReloadParse), 0);
    }

    #[tokio::test]
    async fn test_wait_for_immediate_satisfaction() {
        let (_tx, rx) = watch::channel(5u64);
        let mut updates = BundleUpdates { rx };

        assert_eq!(updates.wait_for(|&seq| seq >= 5).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_changed_after_drop_is_closed() {
        let reader = WatchingCertificateReader::new_for_test(
            bundle(1),
            Arc::new(FailingReader(ErrorKind::Io)),
            None,
        );
        let mut updates = reader.updated();
        drop(reader);

        let err = updates.changed().await.unwrap_err();
        assert!(matches!(err, WatchingReaderError::Closed));
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_keeps_bundle() {
        let initial = bundle(3);
        let reader = WatchingCertificateReader::new_for_test(
            Arc::clone(&initial),
            Arc::new(FailingReader(ErrorKind::Io)),
            None,
        );
        assert!(reader.is_watching());

        reader.shutdown().await;
        reader.shutdown().await;
        reader
            .shutdown_with_timeout(Duration::from_millis(10))
            .await
            .unwrap();

        assert!(!reader.is_watching());
        assert!(Arc::ptr_eq(&reader.bundle(), &initial));
    }

    #[tokio::test]
    async fn test_read_certificate_serves_cache() {
        let initial = bundle(9);
        let reader = WatchingCertificateReader::new_for_test(
            Arc::clone(&initial),
            Arc::new(FailingReader(ErrorKind::Io)),
            None,
        );

        let served = CertificateReader::read_certificate(&reader).unwrap();
        assert!(Arc::ptr_eq(&served, &initial));
        assert_eq!(reader.not_before(), initial.not_before());
    }
}
