//! In-memory collaborators that record what the engine did to them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use site_sync_core::config::{RunConfig, SyncOptions};
use site_sync_core::contract::{
    BackendError, Cdn, InvalidationBatch, InvalidationSummary, ObjectMetadata, ObjectStore,
    PutObject,
};
use site_sync_core::progress::{Progress, ProgressEvent};

/// Object store backed by a map, with optional artificial latency on puts.
#[derive(Default)]
pub struct RecordingStore {
    objects: Mutex<HashMap<String, ObjectMetadata>>,
    puts: Mutex<Vec<PutObject>>,
    heads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    put_delay: Duration,
    fail_on_key: Option<String>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_put_delay(delay: Duration) -> Self {
        Self {
            put_delay: delay,
            ..Self::default()
        }
    }

    pub fn failing_on(key: &str) -> Self {
        Self {
            fail_on_key: Some(key.to_string()),
            ..Self::default()
        }
    }

    pub fn puts(&self) -> Vec<PutObject> {
        self.puts.lock().unwrap().clone()
    }

    pub fn put_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.puts().into_iter().map(|p| p.key).collect();
        keys.sort();
        keys
    }

    pub fn clear_puts(&self) {
        self.puts.lock().unwrap().clear();
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn object(&self, key: &str) -> Option<ObjectMetadata> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn head_object_metadata(
        &self,
        _bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, BackendError> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn put_object(&self, request: PutObject) -> Result<(), BackendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.put_delay.is_zero() {
            tokio::time::sleep(self.put_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on_key.as_deref() == Some(request.key.as_str()) {
            return Err(format!("simulated failure writing {}", request.key).into());
        }

        self.objects.lock().unwrap().insert(
            request.key.clone(),
            ObjectMetadata {
                user_metadata: request.metadata.clone(),
            },
        );
        self.puts.lock().unwrap().push(request);
        Ok(())
    }
}

/// CDN with a fixed invalidation list that records created batches.
#[derive(Default)]
pub struct RecordingCdn {
    existing: Vec<InvalidationSummary>,
    batches: Mutex<Vec<InvalidationBatch>>,
    lists: AtomicUsize,
}

impl RecordingCdn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(existing: Vec<InvalidationSummary>) -> Self {
        Self {
            existing,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<InvalidationBatch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cdn for RecordingCdn {
    async fn list_invalidations(
        &self,
        _distribution_id: &str,
    ) -> Result<Vec<InvalidationSummary>, BackendError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.existing.clone())
    }

    async fn create_invalidation(&self, batch: InvalidationBatch) -> Result<String, BackendError> {
        let mut batches = self.batches.lock().unwrap();
        batches.push(batch);
        Ok(format!("I{}", batches.len()))
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Progress for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A small static site:
///
/// ```text
/// index.html, about.html, css/site.css, blog/index.html, blog/first-post.html
/// ```
pub fn make_site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    std::fs::create_dir_all(root.join("css")).unwrap();
    std::fs::create_dir_all(root.join("blog")).unwrap();
    std::fs::write(root.join("index.html"), b"<h1>home</h1>").unwrap();
    std::fs::write(root.join("about.html"), b"<h1>about</h1>").unwrap();
    std::fs::write(root.join("css/site.css"), b"body { margin: 0 }").unwrap();
    std::fs::write(root.join("blog/index.html"), b"<h1>blog</h1>").unwrap();
    std::fs::write(root.join("blog/first-post.html"), b"<p>first</p>").unwrap();
    dir
}

pub fn run_config(root: &Path, tweak: impl FnOnce(&mut SyncOptions)) -> RunConfig {
    let mut options = SyncOptions {
        source_directory: Some(root.to_path_buf()),
        bucket: Some("www.example.com".into()),
        ..Default::default()
    };
    tweak(&mut options);
    RunConfig::from_options(options).expect("valid config")
}
