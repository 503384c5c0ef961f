//! User-facing progress reporting.
//!
//! The orchestrator emits [`ProgressEvent`]s to an injected [`Progress`]
//! sink instead of writing to a global logger. Diagnostics still go through
//! `tracing`.

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Something the user may want to see while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    CheckingOngoingInvalidations { distribution_id: String },
    Scanning { root: String },
    Fingerprinting { files: usize },
    Uploading { files: usize },
    Unchanged { relative_path: String, key: String },
    Uploaded { relative_path: String, key: String, dry_run: bool },
    Invalidating { distribution_id: String, paths: usize },
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Progress: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards everything; used for `--quiet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn report(&self, _event: ProgressEvent) {}
}
