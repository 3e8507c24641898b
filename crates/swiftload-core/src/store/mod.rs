//! Object storage client seam.
//!
//! The load test only needs container create/delete and object
//! stat/put/get/delete. [`swift::SwiftStore`] talks to a real cluster;
//! [`memory::MemoryStore`] keeps everything in process.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use tokio::io::AsyncWrite;

pub mod memory;
pub mod swift;

/// Content type marking a zero-length object as a directory placeholder.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/directory";

/// Metadata returned by a successful stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub content_type: String,
    pub fingerprint: String,
    pub size: u64,
}

impl ObjectInfo {
    pub fn is_directory_marker(&self) -> bool {
        self.content_type == DIRECTORY_CONTENT_TYPE
    }
}

/// Payload of a put.
#[derive(Debug)]
pub enum ObjectBody {
    Empty,
    File(tokio::fs::File),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Establish a session. Must succeed before any other call.
    async fn authenticate(&self) -> Result<()>;

    /// Create `container`; succeeds if it already exists.
    async fn create_container(&self, container: &str) -> Result<()>;

    async fn delete_container(&self, container: &str) -> Result<()>;

    /// Returns `Ok(None)` when the object does not exist.
    async fn stat_object(&self, container: &str, path: &str) -> Result<Option<ObjectInfo>>;

    /// Store `body` at `path`. When `fingerprint` is given the store must
    /// reject content whose digest differs.
    async fn put_object(
        &self,
        container: &str,
        path: &str,
        body: ObjectBody,
        fingerprint: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<()>;

    /// Stream the object into `dest`, returning the number of bytes written.
    async fn get_object(
        &self,
        container: &str,
        path: &str,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64>;

    async fn delete_object(&self, container: &str, path: &str) -> Result<()>;
}

/// Produces a fresh client for each batch iteration.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn ObjectStore>>;
}
