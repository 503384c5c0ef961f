//! Error taxonomy for a sync run.
//!
//! Every variant is fatal to the run. The only remote failure that never
//! reaches this type is "object not found" during fingerprint comparison,
//! which store adapters report as `Ok(None)`.

use std::io;
use std::path::PathBuf;

use crate::contract::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Missing or invalid option, unpaired credential, colliding keys.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unreadable source tree or file.
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any object store failure other than "not found" on a metadata query.
    #[error("remote store error for key {key}: {source}")]
    RemoteStore {
        key: String,
        #[source]
        source: BackendError,
    },

    /// Invalidation list/create failures.
    #[error("CDN error for distribution {distribution_id}: {source}")]
    Cdn {
        distribution_id: String,
        #[source]
        source: BackendError,
    },

    /// The distribution already has an invalidation in flight.
    #[error("distribution {distribution_id} has ongoing invalidations: {}", pending.join(", "))]
    DeploymentConflict {
        distribution_id: String,
        pending: Vec<String>,
    },
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SyncError::Configuration(message.into())
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn remote_store(key: impl Into<String>, source: BackendError) -> Self {
        SyncError::RemoteStore {
            key: key.into(),
            source,
        }
    }

    pub fn cdn(distribution_id: impl Into<String>, source: BackendError) -> Self {
        SyncError::Cdn {
            distribution_id: distribution_id.into(),
            source,
        }
    }
}
