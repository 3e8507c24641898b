//! Directory placeholder lifecycle.
//!
//! Before the object pipeline starts, every discovered directory gets a
//! zero-length placeholder object (unless one is already there) and a
//! matching local download directory. After all object results are in, the
//! placeholders are deleted again. Each phase fans out one task per
//! directory and returns only once every task has finished.

use std::sync::Arc;

use crate::enumeration::DiscoveredPath;
use crate::errors::{ItemError, Stage};
use crate::pool::TaskPool;
use crate::store::{ObjectBody, ObjectStore, DIRECTORY_CONTENT_TYPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectoryOutcome {
    Created,
    Unchanged,
    Deleted,
}

/// Tally of one lifecycle phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryReport {
    pub created: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failures: Vec<ItemError>,
}

impl DirectoryReport {
    fn absorb(&mut self, outcome: Result<DirectoryOutcome, ItemError>) {
        match outcome {
            Ok(DirectoryOutcome::Created) => self.created += 1,
            Ok(DirectoryOutcome::Unchanged) => self.unchanged += 1,
            Ok(DirectoryOutcome::Deleted) => self.deleted += 1,
            Err(err) => self.failures.push(err),
        }
    }
}

#[derive(Clone)]
pub struct DirectoryLifecycle {
    store: Arc<dyn ObjectStore>,
    container: Arc<str>,
    parallelism: usize,
}

impl DirectoryLifecycle {
    pub fn new(store: Arc<dyn ObjectStore>, container: &str, parallelism: usize) -> Self {
        Self {
            store,
            container: Arc::from(container),
            parallelism,
        }
    }

    /// Ensure remote placeholders and local download directories exist for
    /// every entry in `dirs`.
    pub async fn create_all(&self, dirs: &[DiscoveredPath]) -> DirectoryReport {
        let mut pool = TaskPool::new(self.parallelism);
        for dir in dirs.iter().cloned() {
            let store = Arc::clone(&self.store);
            let container = Arc::clone(&self.container);
            pool.spawn(async move { ensure_directory(store.as_ref(), &container, dir).await });
        }
        self.finish(pool, Stage::DirectoryCreate).await
    }

    /// Delete the remote placeholder of every entry in `dirs`.
    pub async fn delete_all(&self, dirs: &[DiscoveredPath]) -> DirectoryReport {
        let mut pool = TaskPool::new(self.parallelism);
        for dir in dirs.iter().cloned() {
            let store = Arc::clone(&self.store);
            let container = Arc::clone(&self.container);
            pool.spawn(async move { remove_directory(store.as_ref(), &container, dir).await });
        }
        self.finish(pool, Stage::DirectoryDelete).await
    }

    async fn finish(
        &self,
        pool: TaskPool<Result<DirectoryOutcome, ItemError>>,
        stage: Stage,
    ) -> DirectoryReport {
        let mut report = DirectoryReport::default();
        for joined in pool.join_all().await {
            match joined {
                Ok(outcome) => report.absorb(outcome),
                Err(err) => {
                    log::error!("directory task failed: {err}");
                    report.failures.push(ItemError::msg(
                        stage,
                        "<unknown>",
                        err.to_string(),
                    ));
                }
            }
        }
        report
    }
}

async fn ensure_directory(
    store: &dyn ObjectStore,
    container: &str,
    dir: DiscoveredPath,
) -> Result<DirectoryOutcome, ItemError> {
    let path = dir.object_path.as_str();

    // A failed stat is treated like a missing placeholder.
    let existing = store.stat_object(container, path).await;
    let outcome = match existing {
        Ok(Some(info)) if info.is_directory_marker() => {
            log::info!("unchanged: {path}");
            DirectoryOutcome::Unchanged
        }
        _ => {
            store
                .put_object(
                    container,
                    path,
                    ObjectBody::Empty,
                    None,
                    Some(DIRECTORY_CONTENT_TYPE),
                )
                .await
                .map_err(|err| {
                    let err = ItemError::new(Stage::DirectoryCreate, path, err);
                    log::error!("{err}");
                    err
                })?;
            log::info!("added object dir: {path}");
            DirectoryOutcome::Created
        }
    };

    tokio::fs::create_dir_all(&dir.download_path)
        .await
        .map_err(|err| {
            let err = ItemError::new(
                Stage::DirectoryLocal,
                dir.download_path.display().to_string(),
                eyre::Report::new(err),
            );
            log::error!("{err}");
            err
        })?;

    Ok(outcome)
}

async fn remove_directory(
    store: &dyn ObjectStore,
    container: &str,
    dir: DiscoveredPath,
) -> Result<DirectoryOutcome, ItemError> {
    let path = dir.object_path.as_str();
    store.delete_object(container, path).await.map_err(|err| {
        let err = ItemError::new(Stage::DirectoryDelete, path, err);
        log::error!("{err}");
        err
    })?;
    log::info!("deleted object dir: {path}");
    Ok(DirectoryOutcome::Deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::path::Path;

    fn dir(root: &Path, object_path: &str) -> DiscoveredPath {
        DiscoveredPath {
            local_path: None,
            object_path: object_path.to_string(),
            download_path: root.join(object_path),
        }
    }

    #[tokio::test]
    async fn creates_placeholders_and_local_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.create_container("c").await.unwrap();
        let lifecycle = DirectoryLifecycle::new(store.clone(), "c", 0);

        let dirs = vec![dir(temp.path(), "a"), dir(temp.path(), "a/b")];
        let report = lifecycle.create_all(&dirs).await;

        assert_eq!(report.created, 2);
        assert!(report.failures.is_empty());
        assert!(temp.path().join("a/b").is_dir());
        let info = store.stat_object("c", "a/b").await.unwrap().unwrap();
        assert!(info.is_directory_marker());
    }

    #[tokio::test]
    async fn existing_placeholder_is_unchanged() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert_object("c", "a", b"", DIRECTORY_CONTENT_TYPE);
        store.insert_object("c", "b", b"", "text/plain");
        let lifecycle = DirectoryLifecycle::new(store.clone(), "c", 0);

        let report = lifecycle
            .create_all(&[dir(temp.path(), "a"), dir(temp.path(), "b")])
            .await;

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.created, 1);
        assert_eq!(store.counts().puts, 1);
        assert!(temp.path().join("a").is_dir());
    }

    #[tokio::test]
    async fn failed_stat_writes_placeholder() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.create_container("c").await.unwrap();
        store.fail_stat("d");
        let lifecycle = DirectoryLifecycle::new(store.clone(), "c", 0);

        let report = lifecycle.create_all(&[dir(temp.path(), "d")]).await;

        assert_eq!(report.created, 1);
        assert_eq!(report.unchanged, 0);
        assert!(report.failures.is_empty());
        assert_eq!(store.counts().stats, 1);
        assert_eq!(store.counts().puts, 1);
        assert_eq!(store.object_paths("c"), vec!["d".to_string()]);
        assert!(temp.path().join("d").is_dir());
    }

    #[tokio::test]
    async fn failed_placeholder_skips_local_dir() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.create_container("c").await.unwrap();
        store.fail_put("bad");
        let lifecycle = DirectoryLifecycle::new(store.clone(), "c", 2);

        let report = lifecycle
            .create_all(&[dir(temp.path(), "bad"), dir(temp.path(), "good")])
            .await;

        assert_eq!(report.created, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, Stage::DirectoryCreate);
        assert_eq!(report.failures[0].path, "bad");
        assert!(!temp.path().join("bad").exists());
        assert!(temp.path().join("good").is_dir());
    }

    #[tokio::test]
    async fn delete_failures_do_not_stop_siblings() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert_object("c", "a", b"", DIRECTORY_CONTENT_TYPE);
        store.insert_object("c", "b", b"", DIRECTORY_CONTENT_TYPE);
        store.fail_delete("a");
        let lifecycle = DirectoryLifecycle::new(store.clone(), "c", 0);

        let report = lifecycle
            .delete_all(&[dir(temp.path(), "a"), dir(temp.path(), "b")])
            .await;

        assert_eq!(report.deleted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, Stage::DirectoryDelete);
        assert_eq!(store.object_paths("c"), vec!["a".to_string()]);
    }
}
