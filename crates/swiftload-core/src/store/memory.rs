//! In-process object store with fault injection.
//!
//! Behaves like a single-tenant Swift account: containers must exist before
//! objects are written, non-empty containers cannot be deleted, and a put
//! carrying a fingerprint is rejected if the content digest differs. Every
//! mutating call is appended to a journal so callers can check ordering.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{bail, eyre, Context, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{ObjectBody, ObjectInfo, ObjectStore, StoreConnector};
use crate::checksum::{fingerprint_bytes, fingerprints_match};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    fingerprint: String,
}

/// Operation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpCounts {
    pub authentications: usize,
    pub stats: usize,
    pub puts: usize,
    pub gets: usize,
    pub deletes: usize,
}

/// One mutating call, in the order it completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    CreateContainer(String),
    DeleteContainer(String),
    Put { path: String, content_type: String },
    Delete(String),
}

#[derive(Debug, Default)]
struct Faults {
    authenticate: bool,
    stat: HashSet<String>,
    put: HashSet<String>,
    get: HashSet<String>,
    corrupt: HashSet<String>,
    delete: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    faults: Mutex<Faults>,
    counts: Mutex<OpCounts>,
    journal: Mutex<Vec<JournalEntry>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every network-like call by `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn fail_authentication(&self) {
        self.faults.lock().authenticate = true;
    }

    pub fn fail_stat(&self, path: &str) {
        self.faults.lock().stat.insert(path.to_string());
    }

    pub fn fail_put(&self, path: &str) {
        self.faults.lock().put.insert(path.to_string());
    }

    pub fn fail_get(&self, path: &str) {
        self.faults.lock().get.insert(path.to_string());
    }

    /// Serve `path` with a stray trailing byte on download.
    pub fn corrupt_get(&self, path: &str) {
        self.faults.lock().corrupt.insert(path.to_string());
    }

    pub fn fail_delete(&self, path: &str) {
        self.faults.lock().delete.insert(path.to_string());
    }

    pub fn counts(&self) -> OpCounts {
        *self.counts.lock()
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().clone()
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.containers.lock().contains_key(container)
    }

    pub fn object_paths(&self, container: &str) -> Vec<String> {
        self.containers
            .lock()
            .get(container)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object_data(&self, container: &str, path: &str) -> Option<Vec<u8>> {
        self.containers
            .lock()
            .get(container)
            .and_then(|objects| objects.get(path))
            .map(|obj| obj.data.clone())
    }

    /// Seed an object directly, creating the container if needed.
    pub fn insert_object(&self, container: &str, path: &str, data: &[u8], content_type: &str) {
        self.containers
            .lock()
            .entry(container.to_string())
            .or_default()
            .insert(
                path.to_string(),
                StoredObject {
                    data: data.to_vec(),
                    content_type: content_type.to_string(),
                    fingerprint: fingerprint_bytes(data),
                },
            );
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected(&self, pick: impl FnOnce(&Faults) -> &HashSet<String>, path: &str) -> bool {
        pick(&self.faults.lock()).contains(path)
    }

    fn record(&self, entry: JournalEntry) {
        self.journal.lock().push(entry);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn authenticate(&self) -> Result<()> {
        self.simulate_latency().await;
        self.counts.lock().authentications += 1;
        if self.faults.lock().authenticate {
            bail!("authentication rejected: 401 Unauthorized");
        }
        Ok(())
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        self.simulate_latency().await;
        self.containers
            .lock()
            .entry(container.to_string())
            .or_default();
        self.record(JournalEntry::CreateContainer(container.to_string()));
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        self.simulate_latency().await;
        {
            let mut containers = self.containers.lock();
            match containers.get(container) {
                None => bail!("container '{container}' not found"),
                Some(objects) if !objects.is_empty() => {
                    bail!(
                        "container '{container}' not empty ({} object(s))",
                        objects.len()
                    )
                }
                Some(_) => {
                    containers.remove(container);
                }
            }
        }
        self.record(JournalEntry::DeleteContainer(container.to_string()));
        Ok(())
    }

    async fn stat_object(&self, container: &str, path: &str) -> Result<Option<ObjectInfo>> {
        self.simulate_latency().await;
        self.counts.lock().stats += 1;
        if self.injected(|f| &f.stat, path) {
            bail!("simulated network error during HEAD {path}");
        }
        let containers = self.containers.lock();
        Ok(containers
            .get(container)
            .and_then(|objects| objects.get(path))
            .map(|obj| ObjectInfo {
                content_type: obj.content_type.clone(),
                fingerprint: obj.fingerprint.clone(),
                size: obj.data.len() as u64,
            }))
    }

    async fn put_object(
        &self,
        container: &str,
        path: &str,
        body: ObjectBody,
        fingerprint: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let data = match body {
            ObjectBody::Empty => Vec::new(),
            ObjectBody::File(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)
                    .await
                    .context("read upload body")?;
                buf
            }
        };
        self.simulate_latency().await;
        self.counts.lock().puts += 1;
        if self.injected(|f| &f.put, path) {
            bail!("simulated network error during PUT {path}");
        }

        let digest = fingerprint_bytes(&data);
        if let Some(expected) = fingerprint {
            if !fingerprints_match(expected, &digest) {
                bail!("422 Unprocessable Entity: etag mismatch for {path}");
            }
        }
        let content_type = content_type
            .unwrap_or("application/octet-stream")
            .to_string();

        {
            let mut containers = self.containers.lock();
            let objects = containers
                .get_mut(container)
                .ok_or_else(|| eyre!("container '{container}' not found"))?;
            objects.insert(
                path.to_string(),
                StoredObject {
                    data,
                    content_type: content_type.clone(),
                    fingerprint: digest,
                },
            );
        }
        self.record(JournalEntry::Put {
            path: path.to_string(),
            content_type,
        });
        Ok(())
    }

    async fn get_object(
        &self,
        container: &str,
        path: &str,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        self.simulate_latency().await;
        self.counts.lock().gets += 1;
        if self.injected(|f| &f.get, path) {
            bail!("simulated network error during GET {path}");
        }
        let mut data = self
            .object_data(container, path)
            .ok_or_else(|| eyre!("object '{path}' not found"))?;
        if self.injected(|f| &f.corrupt, path) {
            data.push(b'!');
        }
        dest.write_all(&data).await.context("write download")?;
        dest.flush().await.context("flush download")?;
        Ok(data.len() as u64)
    }

    async fn delete_object(&self, container: &str, path: &str) -> Result<()> {
        self.simulate_latency().await;
        self.counts.lock().deletes += 1;
        if self.injected(|f| &f.delete, path) {
            bail!("simulated network error during DELETE {path}");
        }
        let removed = self
            .containers
            .lock()
            .get_mut(container)
            .and_then(|objects| objects.remove(path));
        if removed.is_none() {
            bail!("object '{path}' not found");
        }
        self.record(JournalEntry::Delete(path.to_string()));
        Ok(())
    }
}

/// Hands out the same shared store on every connect, so state survives
/// across batch iterations.
impl StoreConnector for Arc<MemoryStore> {
    fn connect(&self) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = Arc::clone(self) as Arc<dyn ObjectStore>;
        Ok(store)
    }
}
