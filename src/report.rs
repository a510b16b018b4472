//! Warning reporting threaded through the sync entry points.
//!
//! Recovered anomalies (skipped files, duplicate rows/columns, per-file
//! import failures) are reported through an explicit callback instead of a
//! process-wide logger, so embedders and tests can observe them directly.

use std::cell::RefCell;

/// Receives warnings for anomalies that were recovered with a
/// "keep first / skip" rule.
pub trait SyncReporter {
    fn warning(&self, message: &str);
}

/// Discards all warnings. The default for library use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl SyncReporter for NullReporter {
    fn warning(&self, _message: &str) {}
}

/// Forwards warnings to `tracing::warn!`. Used by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl SyncReporter for TracingReporter {
    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Collects warnings in memory for later inspection.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    warnings: RefCell<Vec<String>>,
}

impl CollectingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }
}

impl SyncReporter for CollectingReporter {
    fn warning(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

impl<R: SyncReporter + ?Sized> SyncReporter for &R {
    fn warning(&self, message: &str) {
        (**self).warning(message);
    }
}
