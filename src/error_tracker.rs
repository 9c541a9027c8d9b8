//! Suppression of repeated identical errors in background loops.

/// Maximum number of consecutive identical errors logged at WARN before downgrading to DEBUG.
pub(crate) const MAX_CONSECUTIVE_SAME_ERROR: u32 = 3;

/// Allocation-free key type for error tracking categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ErrorKey {
    /// The watched file could not be read while polling.
    WatchRead,
    /// The change callback returned an error.
    WatchCallback,
}

/// Tracks consecutive occurrences of the same error kind.
///
/// For the first N consecutive occurrences of a kind, [`ErrorTracker::record_error`] returns
/// `true` (log at WARN). After that it returns `false` (log at DEBUG). A different kind or a
/// [`ErrorTracker::reset`] restarts the count.
#[derive(Debug)]
pub(crate) struct ErrorTracker {
    last_error_kind: Option<ErrorKey>,
    consecutive_same_error: u32,
    max_consecutive: u32,
}

impl ErrorTracker {
    pub(crate) fn new(max_consecutive: u32) -> Self {
        Self {
            last_error_kind: None,
            consecutive_same_error: 0,
            max_consecutive,
        }
    }

    pub(crate) fn record_error(&mut self, error_kind: ErrorKey) -> bool {
        let should_warn = self.last_error_kind != Some(error_kind)
            || self.consecutive_same_error < self.max_consecutive;

        if self.last_error_kind == Some(error_kind) {
            self.consecutive_same_error += 1;
        } else {
            self.consecutive_same_error = 1;
            self.last_error_kind = Some(error_kind);
        }

        should_warn
    }

    pub(crate) fn reset(&mut self) {
        self.consecutive_same_error = 0;
        self.last_error_kind = None;
    }

    pub(crate) fn consecutive_count(&self) -> u32 {
        self.consecutive_same_error
    }

    pub(crate) fn last_error_kind(&self) -> Option<ErrorKey> {
        self.last_error_kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warns_for_first_occurrences_only() {
        let mut tracker = ErrorTracker::new(MAX_CONSECUTIVE_SAME_ERROR);

        assert!(tracker.record_error(ErrorKey::WatchRead));
        assert!(tracker.record_error(ErrorKey::WatchRead));
        assert!(tracker.record_error(ErrorKey::WatchRead));
        assert!(!tracker.record_error(ErrorKey::WatchRead));
        assert_eq!(tracker.consecutive_count(), 4);
    }

    #[test]
    fn test_different_kind_restarts_count() {
        let mut tracker = ErrorTracker::new(1);

        assert!(tracker.record_error(ErrorKey::WatchRead));
        assert!(!tracker.record_error(ErrorKey::WatchRead));
        assert!(tracker.record_error(ErrorKey::WatchCallback));
        assert_eq!(tracker.last_error_kind(), Some(ErrorKey::WatchCallback));
        assert_eq!(tracker.consecutive_count(), 1);
    }

    #[test]
    fn test_reset() {
        let mut tracker = ErrorTracker::new(1);
        tracker.record_error(ErrorKey::WatchRead);
        tracker.record_error(ErrorKey::WatchRead);
        tracker.reset();

        assert_eq!(tracker.last_error_kind(), None);
        assert_eq!(tracker.consecutive_count(), 0);
        assert!(tracker.record_error(ErrorKey::WatchRead));
    }
}
