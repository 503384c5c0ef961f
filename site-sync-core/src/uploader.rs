//! Bounded skip-or-upload over a list of candidates.
//!
//! Two phases, each capped at the configured concurrency:
//! [`prepare_candidates`] maps and fingerprints every scanned file, then
//! [`upload_all`] compares fingerprints with remote metadata and writes the
//! files that changed. The first error aborts the phase; futures still in
//! flight are dropped.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::contract::{ObjectStore, PutObject, FINGERPRINT_METADATA_KEY};
use crate::error::SyncError;
use crate::fingerprint::{fingerprint_file, Fingerprint};
use crate::keys::{map_key, KeyMapping};
use crate::progress::{Progress, ProgressEvent};
use crate::scan::FileDescriptor;

/// A scanned file with its destination and fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub file: FileDescriptor,
    pub key: String,
    pub uri: String,
    pub content_type: Option<&'static str>,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Written (or would have been, in a dry run). `uri` feeds invalidation.
    Uploaded { uri: String },
    /// Remote fingerprint matched.
    Skipped,
}

/// `Err` is the failed case; it aborts the run.
pub type UploadResult = Result<UploadOutcome, SyncError>;

/// Outcome for one file, in candidate order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileReport {
    pub relative_path: String,
    pub key: String,
    pub size_bytes: u64,
    pub uploaded: bool,
}

/// Map every file to its key and fingerprint it, at most `concurrency` at a time.
///
/// Fails if two files map to the same key (e.g. `about` next to `about.html`).
pub async fn prepare_candidates(
    files: Vec<FileDescriptor>,
    key_prefix: &str,
    concurrency: usize,
) -> Result<Vec<UploadCandidate>, SyncError> {
    let mut owners: HashMap<String, String> = HashMap::with_capacity(files.len());
    let mut mapped = Vec::with_capacity(files.len());
    for file in files {
        let mapping = map_key(&file.relative_path, key_prefix);
        if let Some(previous) = owners.insert(mapping.key.clone(), file.relative_path.clone()) {
            return Err(SyncError::configuration(format!(
                "{} and {} both map to object key {}",
                previous, file.relative_path, mapping.key
            )));
        }
        mapped.push((file, mapping));
    }

    fingerprint_mapped(mapped, concurrency, |path| async move {
        fingerprint_file(&path).await
    })
    .await
}

async fn fingerprint_mapped<H, Fut>(
    mapped: Vec<(FileDescriptor, KeyMapping)>,
    concurrency: usize,
    hash: H,
) -> Result<Vec<UploadCandidate>, SyncError>
where
    H: Fn(PathBuf) -> Fut,
    Fut: Future<Output = Result<Fingerprint, SyncError>>,
{
    let hash = &hash;
    stream::iter(mapped)
        .map(|(file, mapping)| async move {
            let fingerprint = hash(file.absolute_path.clone()).await?;
            Ok::<_, SyncError>(UploadCandidate {
                file,
                key: mapping.key,
                uri: mapping.uri,
                content_type: mapping.content_type,
                fingerprint,
            })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Decide and perform the upload for a single candidate.
pub async fn upload_candidate<S, P>(
    store: &S,
    config: &RunConfig,
    progress: &P,
    candidate: &UploadCandidate,
) -> UploadResult
where
    S: ObjectStore + ?Sized,
    P: Progress + ?Sized,
{
    let key = &candidate.key;

    if config.check_fingerprint() {
        let existing = store
            .head_object_metadata(config.bucket(), key)
            .await
            .map_err(|e| SyncError::remote_store(key.as_str(), e))?;
        let remote = existing.as_ref().and_then(|m| m.fingerprint());
        if remote == Some(candidate.fingerprint.as_str()) {
            debug!(key = %key, "Remote fingerprint matches, skipping");
            progress.report(ProgressEvent::Unchanged {
                relative_path: candidate.file.relative_path.clone(),
                key: key.clone(),
            });
            return Ok(UploadOutcome::Skipped);
        }
    }

    let mut metadata = HashMap::new();
    if config.set_fingerprint_metadata() {
        metadata.insert(
            FINGERPRINT_METADATA_KEY.to_string(),
            candidate.fingerprint.clone(),
        );
    }

    if config.dry_run() {
        debug!(key = %key, "Dry run, not writing object");
    } else {
        let request = PutObject {
            bucket: config.bucket().to_string(),
            key: key.clone(),
            body: candidate.file.absolute_path.clone(),
            size_bytes: candidate.file.size_bytes,
            acl: config.acl().to_string(),
            content_type: candidate.content_type.map(str::to_string),
            content_md5: candidate.fingerprint.clone(),
            metadata,
        };
        store
            .put_object(request)
            .await
            .map_err(|e| SyncError::remote_store(key.as_str(), e))?;
        debug!(key = %key, size_bytes = candidate.file.size_bytes, "Object written");
    }

    progress.report(ProgressEvent::Uploaded {
        relative_path: candidate.file.relative_path.clone(),
        key: key.clone(),
        dry_run: config.dry_run(),
    });
    Ok(UploadOutcome::Uploaded {
        uri: candidate.uri.clone(),
    })
}

/// Run [`upload_candidate`] over all candidates with at most
/// `config.concurrency()` in flight. Results come back in candidate order.
pub async fn upload_all<S, P>(
    store: &S,
    config: &RunConfig,
    progress: &P,
    candidates: &[UploadCandidate],
) -> Result<Vec<(FileReport, UploadOutcome)>, SyncError>
where
    S: ObjectStore + ?Sized,
    P: Progress + ?Sized,
{
    info!(
        candidates = candidates.len(),
        concurrency = config.concurrency(),
        "Uploading candidates"
    );

    let results: Vec<(FileReport, UploadOutcome)> = stream::iter(candidates)
        .map(|candidate| async move {
            let outcome = upload_candidate(store, config, progress, candidate).await?;
            let report = FileReport {
                relative_path: candidate.file.relative_path.clone(),
                key: candidate.key.clone(),
                size_bytes: candidate.file.size_bytes,
                uploaded: matches!(outcome, UploadOutcome::Uploaded { .. }),
            };
            Ok::<_, SyncError>((report, outcome))
        })
        .buffered(config.concurrency())
        .try_collect()
        .await?;

    let uploaded = results.iter().filter(|(r, _)| r.uploaded).count();
    info!(
        uploaded,
        skipped = results.len() - uploaded,
        "Upload phase complete"
    );
    Ok(results)
}
