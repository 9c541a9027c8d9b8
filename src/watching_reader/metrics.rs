use super::errors::MetricsErrorKind;

/// Trait for recording metrics from a [`WatchingCertificateReader`](super::WatchingCertificateReader).
///
/// Implement this trait to integrate with your metrics system (e.g., Prometheus, `StatsD`).
/// Prefer stable, low-cardinality labels when recording metrics.
///
/// # Example
///
/// ```no_run
/// use fpa::watching_reader::{MetricsErrorKind, MetricsRecorder};
///
/// struct MyMetrics;
///
/// impl MetricsRecorder for MyMetrics {
///     fn record_reload(&self) {
///         // Count successful rotations
///     }
///
///     fn record_error(&self, kind: MetricsErrorKind) {
///         println!("Error: {}", kind.as_str());
///     }
/// }
/// ```
pub trait MetricsRecorder: Send + Sync {
    /// Records that a new bundle was published by a reload.
    ///
    /// Not recorded for the initial load performed during construction.
    fn record_reload(&self);

    /// Records an error with a structured error kind.
    fn record_error(&self, kind: MetricsErrorKind);
}
