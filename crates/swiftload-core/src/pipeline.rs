//! Per-file upload/download/delete pipeline.
//!
//! Every discovered file becomes one task. A task sends exactly one
//! [`ObjectOutcome`] through the shared channel, whichever step it stops at.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::checksum::{fingerprints_match, hash_file_async};
use crate::enumeration::DiscoveredPath;
use crate::errors::{ItemError, Stage};
use crate::pool::TaskPool;
use crate::store::{ObjectBody, ObjectStore};

/// Timings for one fully processed file. An `upload_seconds` of zero means
/// the upload was skipped because the remote copy was already current.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingRecord {
    pub upload_seconds: f64,
    pub download_seconds: f64,
    pub delete_seconds: f64,
    pub size_bytes: u64,
    pub object_path: String,
}

impl TimingRecord {
    pub fn total_seconds(&self) -> f64 {
        self.upload_seconds + self.download_seconds + self.delete_seconds
    }

    pub fn upload_skipped(&self) -> bool {
        self.upload_seconds == 0.0
    }
}

pub type ObjectOutcome = Result<TimingRecord, ItemError>;

#[derive(Clone)]
pub struct ObjectWorker {
    store: Arc<dyn ObjectStore>,
    container: Arc<str>,
    verify_download: bool,
}

impl ObjectWorker {
    pub fn new(store: Arc<dyn ObjectStore>, container: &str) -> Self {
        Self {
            store,
            container: Arc::from(container),
            verify_download: false,
        }
    }

    /// Re-hash every download and compare it with the local original.
    pub fn verify_downloads(mut self, enabled: bool) -> Self {
        self.verify_download = enabled;
        self
    }

    /// Run every step for `item`, stopping at the first failure.
    pub async fn process(&self, item: &DiscoveredPath) -> ObjectOutcome {
        let path = item.object_path.as_str();
        let container = &*self.container;
        let Some(local_path) = item.local_path.clone() else {
            return Err(ItemError::msg(Stage::Open, path, "not a regular file"));
        };

        let fingerprint = hash_file_async(local_path.clone())
            .await
            .map_err(|err| ItemError::new(Stage::Hash, path, err))?;

        let existing = self
            .store
            .stat_object(container, path)
            .await
            .map_err(|err| ItemError::new(Stage::Stat, path, err))?;

        let mut upload_seconds = 0.0;
        match existing {
            Some(info) if fingerprints_match(&info.fingerprint, &fingerprint) => {
                log::info!("unchanged: {path}");
            }
            _ => {
                log::info!("started: {path}");
                let file = tokio::fs::File::open(&local_path)
                    .await
                    .map_err(|err| ItemError::new(Stage::Open, path, err.into()))?;
                let started = Instant::now();
                self.store
                    .put_object(
                        container,
                        path,
                        ObjectBody::File(file),
                        Some(&fingerprint),
                        None,
                    )
                    .await
                    .map_err(|err| ItemError::new(Stage::Upload, path, err))?;
                upload_seconds = started.elapsed().as_secs_f64();
                log::info!("uploaded: {path}");
            }
        }

        let size_bytes = match self.store.stat_object(container, path).await {
            Ok(Some(info)) => info.size,
            Ok(None) => {
                return Err(ItemError::msg(
                    Stage::Size,
                    path,
                    "object missing after upload",
                ))
            }
            Err(err) => return Err(ItemError::new(Stage::Size, path, err)),
        };

        let mut dest = tokio::fs::File::create(&item.download_path)
            .await
            .map_err(|err| ItemError::new(Stage::CreateLocal, path, err.into()))?;
        let started = Instant::now();
        self.store
            .get_object(container, path, &mut dest)
            .await
            .map_err(|err| ItemError::new(Stage::Download, path, err))?;
        let download_seconds = started.elapsed().as_secs_f64();
        dest.flush()
            .await
            .map_err(|err| ItemError::new(Stage::Download, path, err.into()))?;
        drop(dest);
        log::info!("downloaded: {path}");

        if self.verify_download {
            let downloaded = hash_file_async(item.download_path.clone())
                .await
                .map_err(|err| ItemError::new(Stage::Verify, path, err))?;
            if !fingerprints_match(&downloaded, &fingerprint) {
                return Err(ItemError::msg(
                    Stage::Verify,
                    path,
                    format!("fingerprint {downloaded} does not match local {fingerprint}"),
                ));
            }
        }

        let started = Instant::now();
        self.store
            .delete_object(container, path)
            .await
            .map_err(|err| ItemError::new(Stage::Delete, path, err))?;
        let delete_seconds = started.elapsed().as_secs_f64();
        log::info!("deleted: {path}");

        Ok(TimingRecord {
            upload_seconds,
            download_seconds,
            delete_seconds,
            size_bytes,
            object_path: item.object_path.clone(),
        })
    }
}

/// Launch one task per file. The receiver yields one outcome per file and
/// closes once every task has finished (or died).
pub fn spawn_pipeline(
    worker: ObjectWorker,
    files: Vec<DiscoveredPath>,
    parallelism: usize,
) -> (TaskPool<()>, mpsc::UnboundedReceiver<ObjectOutcome>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut pool = TaskPool::new(parallelism);
    for file in files {
        let worker = worker.clone();
        let tx = tx.clone();
        pool.spawn(async move {
            let outcome = worker.process(&file).await;
            if tx.send(outcome).is_err() {
                log::debug!("result receiver dropped");
            }
        });
    }
    (pool, rx)
}
