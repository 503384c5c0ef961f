//! # contract: capability interfaces consumed by the sync engine
//!
//! This module defines the two traits the engine talks to the outside world
//! through, plus the plain data types crossing them:
//!
//! - [`ObjectStore`]: "head object metadata" and "put object with metadata".
//! - [`Cdn`]: "list invalidation jobs" and "create invalidation job".
//!
//! ## Implementing
//! - Adapters live outside this crate (the CLI crate ships S3 and CloudFront ones).
//! - All methods are async and return [`BackendError`] on failure; the engine
//!   wraps those with the key or distribution they concern.
//! - `head_object_metadata` must return `Ok(None)` when the object does not
//!   exist. Any other failure is an error and aborts the run.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall` (`MockObjectStore`, `MockCdn`),
//! exported under the `test-export-mocks` feature for downstream tests.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Boxed error returned by adapters.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Metadata key under which the content fingerprint is stored on objects.
pub const FINGERPRINT_METADATA_KEY: &str = "content-md5";

/// User metadata of a remote object, as returned by a head request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub user_metadata: HashMap<String, String>,
}

impl ObjectMetadata {
    pub fn with_fingerprint(fingerprint: &str) -> Self {
        let mut user_metadata = HashMap::new();
        user_metadata.insert(FINGERPRINT_METADATA_KEY.to_string(), fingerprint.to_string());
        Self { user_metadata }
    }

    /// Fingerprint recorded by a previous upload, if any.
    pub fn fingerprint(&self) -> Option<&str> {
        self.user_metadata
            .get(FINGERPRINT_METADATA_KEY)
            .map(String::as_str)
    }
}

/// Everything needed to write one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    /// Local file whose bytes become the object body.
    pub body: PathBuf,
    pub size_bytes: u64,
    pub acl: String,
    pub content_type: Option<String>,
    /// Base64 MD5 of the body, sent as the `Content-MD5` integrity header.
    pub content_md5: String,
    pub metadata: HashMap<String, String>,
}

/// One entry of a distribution's invalidation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationSummary {
    pub id: String,
    pub status: String,
}

impl InvalidationSummary {
    pub fn is_completed(&self) -> bool {
        self.status == "Completed"
    }
}

/// A request to invalidate a set of paths on a distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationBatch {
    pub distribution_id: String,
    pub paths: BTreeSet<String>,
    pub caller_reference: String,
}

/// Object storage capability. Implementations hold a long-lived client and
/// are shared by reference across concurrent tasks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata of the object at `key`, or `None` if it does not exist.
    async fn head_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, BackendError>;

    /// Write an object, replacing any existing one at the same key.
    async fn put_object(&self, request: PutObject) -> Result<(), BackendError>;
}

/// CDN invalidation capability.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Cdn: Send + Sync {
    /// Invalidations known for the distribution, most recent first.
    async fn list_invalidations(
        &self,
        distribution_id: &str,
    ) -> Result<Vec<InvalidationSummary>, BackendError>;

    /// Submit a batch and return the id the CDN assigned to it.
    async fn create_invalidation(&self, batch: InvalidationBatch) -> Result<String, BackendError>;
}
