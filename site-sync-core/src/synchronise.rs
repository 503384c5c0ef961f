//! High-level pipeline: orchestrates scan → fingerprint → upload → invalidate.
//!
//! # Responsibilities
//! - Fail-fast orchestration of one run for a validated [`RunConfig`]: the
//!   first error from any phase aborts the run and is returned unchanged.
//! - Ongoing invalidations are checked once, before any scan or upload work.
//! - Invalidation is strictly ordered after every upload has completed.
//! - Progress lines go to the injected [`Progress`] sink; diagnostics go
//!   through `tracing`.
//!
//! # Idempotence
//! With fingerprint checking enabled, re-running against an unchanged tree
//! skips every file. There is no rollback: objects written before a failure
//! stay in place and the next run picks up from there.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{RunConfig, RC_FILE_NAME};
use crate::contract::{Cdn, ObjectStore};
use crate::error::SyncError;
use crate::invalidation::{plan_invalidation, InvalidationCoordinator, InvalidationOutcome, InvalidationPlan};
use crate::progress::{Progress, ProgressEvent};
use crate::scan::scan_directory_blocking;
use crate::uploader::{prepare_candidates, upload_all, FileReport, UploadOutcome};

/// What a run did.
#[derive(Debug, Clone, Serialize)]
pub struct SynchroniseReport {
    pub dry_run: bool,
    /// One entry per scanned file, sorted by relative path.
    pub files: Vec<FileReport>,
    /// URIs of uploaded files; the input to granular invalidation.
    pub uploaded_uris: Vec<String>,
    pub files_uploaded: usize,
    pub files_skipped: usize,
    pub bytes_uploaded: u64,
    pub invalidation: InvalidationOutcome,
}

/// Runs a deployment against injected collaborators.
pub struct Synchroniser<'a> {
    store: &'a dyn ObjectStore,
    cdn: Option<&'a dyn Cdn>,
    progress: &'a dyn Progress,
}

impl<'a> Synchroniser<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        cdn: Option<&'a dyn Cdn>,
        progress: &'a dyn Progress,
    ) -> Self {
        Self {
            store,
            cdn,
            progress,
        }
    }

    pub async fn run(&self, config: &RunConfig) -> Result<SynchroniseReport, SyncError> {
        info!(
            source = %config.source_directory().display(),
            bucket = %config.bucket(),
            dry_run = config.dry_run(),
            "[SYNC] Starting synchronisation"
        );

        let mut coordinator = match (config.distribution_id(), self.cdn) {
            (Some(distribution_id), Some(cdn)) => {
                Some(InvalidationCoordinator::new(cdn, Some(distribution_id)))
            }
            (Some(distribution_id), None) => {
                error!(distribution_id, "[SYNC][ERROR] Distribution configured without a CDN client");
                return Err(SyncError::configuration(format!(
                    "distribution {distribution_id} is configured but no CDN client was provided"
                )));
            }
            (None, _) => None,
        };

        // Step 0: refuse to start while the CDN is still busy.
        if config.check_ongoing_invalidations() {
            if let (Some(coordinator), Some(distribution_id)) =
                (coordinator.as_mut(), config.distribution_id())
            {
                self.progress.report(ProgressEvent::CheckingOngoingInvalidations {
                    distribution_id: distribution_id.to_string(),
                });
                coordinator.ensure_no_ongoing().await?;
            }
        }

        // Step 1: scan
        self.progress.report(ProgressEvent::Scanning {
            root: config.source_directory().display().to_string(),
        });
        let files = scan_directory_blocking(
            config.source_directory().to_path_buf(),
            vec![RC_FILE_NAME.to_string()],
        )
        .await?;

        // Step 2: map + fingerprint
        self.progress.report(ProgressEvent::Fingerprinting { files: files.len() });
        let candidates =
            prepare_candidates(files, config.key_prefix(), config.concurrency()).await?;
        info!(candidates = candidates.len(), "[SYNC] Fingerprinting complete");

        // Step 3: upload
        self.progress.report(ProgressEvent::Uploading {
            files: candidates.len(),
        });
        let results = upload_all(self.store, config, self.progress, &candidates).await?;

        let mut files = Vec::with_capacity(results.len());
        let mut uploaded_uris = Vec::new();
        let mut bytes_uploaded = 0u64;
        for (report, outcome) in results {
            if let UploadOutcome::Uploaded { uri } = outcome {
                bytes_uploaded += report.size_bytes;
                uploaded_uris.push(uri);
            }
            files.push(report);
        }
        let files_uploaded = uploaded_uris.len();
        let files_skipped = files.len() - files_uploaded;

        // Step 4: invalidate, only after every upload has finished
        let plan = plan_invalidation(config, &uploaded_uris);
        if let (InvalidationPlan::Paths(paths), Some(distribution_id)) =
            (&plan, config.distribution_id())
        {
            self.progress.report(ProgressEvent::Invalidating {
                distribution_id: distribution_id.to_string(),
                paths: paths.len(),
            });
        }
        let invalidation = match coordinator.as_mut() {
            Some(coordinator) => coordinator.execute(plan).await?,
            None => InvalidationOutcome::NotConfigured,
        };

        let report = SynchroniseReport {
            dry_run: config.dry_run(),
            files,
            uploaded_uris,
            files_uploaded,
            files_skipped,
            bytes_uploaded,
            invalidation,
        };

        info!(
            uploaded = report.files_uploaded,
            skipped = report.files_skipped,
            bytes = report.bytes_uploaded,
            "[SYNC] Synchronisation complete"
        );
        match serde_json::to_string_pretty(&report) {
            Ok(json) => debug!(json = %json, "[SYNC][DEBUG] Report as JSON"),
            Err(e) => error!(error = ?e, "[SYNC][DEBUG] Failed to serialize report as JSON"),
        }
        Ok(report)
    }
}

/// Entrypoint: run one deployment with the given collaborators.
pub async fn synchronise(
    config: &RunConfig,
    store: &dyn ObjectStore,
    cdn: Option<&dyn Cdn>,
    progress: &dyn Progress,
) -> Result<SynchroniseReport, SyncError> {
    Synchroniser::new(store, cdn, progress).run(config).await
}
