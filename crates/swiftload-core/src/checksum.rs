//! Content fingerprints for change detection and upload integrity.
//!
//! Swift reports the MD5 of an object's content as its `Etag`, so a
//! fingerprint here is always the lower-case hex MD5 digest of a byte
//! stream.

use eyre::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const READ_BUF_BYTES: usize = 256 * 1024;

/// Incremental fingerprint over a stream of chunks.
pub struct Fingerprinter {
    ctx: md5::Context,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self {
            ctx: md5::Context::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.ctx.consume(data);
    }

    /// Consume the hasher and return the hex digest.
    pub fn finish(self) -> String {
        format!("{:x}", self.ctx.compute())
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint an in-memory buffer.
pub fn fingerprint_bytes(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Stream a whole file through the digest. The handle is dropped on every
/// exit path, including read failures.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Fingerprinter::new();
    let mut buf = vec![0u8; READ_BUF_BYTES];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish())
}

/// Run [`hash_file`] on the blocking pool so async workers are not stalled
/// by disk reads.
pub async fn hash_file_async(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_file(&path))
        .await
        .context("fingerprint task failed")?
}

/// Compare two fingerprints the way Swift does (hex, case-insensitive).
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn known_digests() {
        assert_eq!(fingerprint_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            fingerprint_bytes(b"hello"),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = Fingerprinter::new();
        hasher.update(b"hel");
        hasher.update(b"lo");
        assert_eq!(hasher.finish(), fingerprint_bytes(b"hello"));
    }

    #[test]
    fn hash_file_streams_large_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..(READ_BUF_BYTES * 3 + 17))
            .map(|i| (i % 251) as u8)
            .collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(hash_file(&path).unwrap(), fingerprint_bytes(&data));
    }

    #[test]
    fn hash_file_missing_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        let err = hash_file(&path).unwrap_err();
        assert!(err.to_string().contains("absent.txt"));
    }

    #[tokio::test]
    async fn async_hash_matches_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"data").unwrap();
        let digest = hash_file_async(path.clone()).await.unwrap();
        assert_eq!(digest, hash_file(&path).unwrap());
    }

    #[test]
    fn comparison_ignores_case() {
        assert!(fingerprints_match(
            "5D41402ABC4B2A76B9719D911017C592",
            "5d41402abc4b2a76b9719d911017c592"
        ));
        assert!(!fingerprints_match("00", "01"));
    }
}
