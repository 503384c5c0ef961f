#![doc = "site-sync-core: core logic library for site-sync."]

//! This crate contains the incremental sync engine: tree scanning, content
//! fingerprinting, key mapping, bounded uploads and CDN invalidation planning.
//! Cloud SDK clients are not included here; they implement the traits in
//! [`contract`] from the CLI crate.
//!
//! # Usage
//! Build a [`config::RunConfig`], pick an [`contract::ObjectStore`] (and
//! optionally a [`contract::Cdn`]) and call [`synchronise::synchronise`].

pub mod config;
pub mod contract;
pub mod error;
pub mod fingerprint;
pub mod invalidation;
pub mod keys;
pub mod progress;
pub mod scan;
pub mod synchronise;
pub mod uploader;

pub use config::{Credentials, RunConfig, SyncOptions};
pub use error::SyncError;
pub use synchronise::{synchronise, SynchroniseReport};
