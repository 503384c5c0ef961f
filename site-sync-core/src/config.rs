//! Run configuration.
//!
//! [`SyncOptions`] is the partial, mergeable layer fed by config files,
//! environment and flags. [`RunConfig`] is the validated, immutable result
//! the engine runs with.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::keys::normalize_key_prefix;

pub const DEFAULT_ACL: &str = "public-read";
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Per-site options file, read from the root of the source directory. It is
/// never uploaded.
pub const RC_FILE_NAME: &str = ".site-sync.yaml";

/// One layer of options. Every field is optional; unset fields fall through
/// to lower-priority layers and finally to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncOptions {
    pub source_directory: Option<PathBuf>,
    pub bucket: Option<String>,
    pub acl: Option<String>,
    pub concurrency: Option<usize>,
    pub key_prefix: Option<String>,
    pub check_md5: Option<bool>,
    pub set_md5: Option<bool>,
    pub check_ongoing_invalidations: Option<bool>,
    pub dry_run: Option<bool>,
    #[serde(alias = "distribution")]
    pub distribution_id: Option<String>,
    pub granular_invalidation: Option<bool>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub quiet: Option<bool>,
}

impl SyncOptions {
    /// Overlay `higher` on top of `self`; fields set in `higher` win.
    pub fn merge(self, higher: SyncOptions) -> SyncOptions {
        SyncOptions {
            source_directory: higher.source_directory.or(self.source_directory),
            bucket: higher.bucket.or(self.bucket),
            acl: higher.acl.or(self.acl),
            concurrency: higher.concurrency.or(self.concurrency),
            key_prefix: higher.key_prefix.or(self.key_prefix),
            check_md5: higher.check_md5.or(self.check_md5),
            set_md5: higher.set_md5.or(self.set_md5),
            check_ongoing_invalidations: higher
                .check_ongoing_invalidations
                .or(self.check_ongoing_invalidations),
            dry_run: higher.dry_run.or(self.dry_run),
            distribution_id: higher.distribution_id.or(self.distribution_id),
            granular_invalidation: higher.granular_invalidation.or(self.granular_invalidation),
            access_key_id: higher.access_key_id.or(self.access_key_id),
            secret_access_key: higher.secret_access_key.or(self.secret_access_key),
            region: higher.region.or(self.region),
            endpoint_url: higher.endpoint_url.or(self.endpoint_url),
            quiet: higher.quiet.or(self.quiet),
        }
    }
}

/// Static access key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    source_directory: PathBuf,
    bucket: String,
    key_prefix: String,
    acl: String,
    concurrency: usize,
    check_fingerprint: bool,
    set_fingerprint_metadata: bool,
    dry_run: bool,
    distribution_id: Option<String>,
    granular_invalidation: bool,
    check_ongoing_invalidations: bool,
    credentials: Option<Credentials>,
    region: Option<String>,
    endpoint_url: Option<String>,
    quiet: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RunConfig {
    /// Validate merged options and fill in defaults.
    pub fn from_options(options: SyncOptions) -> Result<Self, SyncError> {
        let source_directory = options
            .source_directory
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| SyncError::configuration("Missing required option: source_directory"))?;
        let bucket = non_empty(options.bucket)
            .ok_or_else(|| SyncError::configuration("Missing required option: bucket"))?;

        let concurrency = options.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(SyncError::configuration("concurrency must be at least 1"));
        }

        let credentials = match (
            non_empty(options.access_key_id),
            non_empty(options.secret_access_key),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(SyncError::configuration(
                    "Missing required option: secret_access_key (access_key_id was given)",
                ))
            }
            (None, Some(_)) => {
                return Err(SyncError::configuration(
                    "Missing required option: access_key_id (secret_access_key was given)",
                ))
            }
        };

        let config = RunConfig {
            source_directory,
            bucket,
            key_prefix: normalize_key_prefix(options.key_prefix.as_deref().unwrap_or("")),
            acl: non_empty(options.acl).unwrap_or_else(|| DEFAULT_ACL.to_string()),
            concurrency,
            check_fingerprint: options.check_md5.unwrap_or(true),
            set_fingerprint_metadata: options.set_md5.unwrap_or(true),
            dry_run: options.dry_run.unwrap_or(false),
            distribution_id: non_empty(options.distribution_id),
            granular_invalidation: options.granular_invalidation.unwrap_or(false),
            check_ongoing_invalidations: options.check_ongoing_invalidations.unwrap_or(false),
            credentials,
            region: non_empty(options.region),
            endpoint_url: non_empty(options.endpoint_url),
            quiet: options.quiet.unwrap_or(false),
        };
        config.trace_loaded();
        Ok(config)
    }

    pub fn trace_loaded(&self) {
        info!(
            source_directory = %self.source_directory.display(),
            bucket = %self.bucket,
            key_prefix = %self.key_prefix,
            concurrency = self.concurrency,
            dry_run = self.dry_run,
            distribution_id = self.distribution_id.as_deref().unwrap_or("-"),
            "Loaded run configuration"
        );
        debug!(config = ?self, "Run configuration (full debug)");
    }

    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Normalized: empty or ending with `/`.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn acl(&self) -> &str {
        &self.acl
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn check_fingerprint(&self) -> bool {
        self.check_fingerprint
    }

    pub fn set_fingerprint_metadata(&self) -> bool {
        self.set_fingerprint_metadata
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn distribution_id(&self) -> Option<&str> {
        self.distribution_id.as_deref()
    }

    pub fn granular_invalidation(&self) -> bool {
        self.granular_invalidation
    }

    pub fn check_ongoing_invalidations(&self) -> bool {
        self.check_ongoing_invalidations
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }
}
