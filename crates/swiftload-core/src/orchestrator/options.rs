use std::path::PathBuf;

use crate::timing_log::log_file_name;

pub const DEFAULT_LABEL: &str = "label";
pub const DEFAULT_BUCKET: &str = "global_unique_bucket_name_12345";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads/small";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";

/// Options for a complete load-test run.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub label: String,
    /// Number of full create/upload/download/delete cycles.
    pub batch: u32,
    /// Absolute upload root.
    pub upload_dir: PathBuf,
    pub bucket: String,
    /// Maximum in-flight tasks per phase; 0 means one task per item at once.
    pub parallelism: usize,
    pub verify_downloads: bool,
    pub log_dir: PathBuf,
    pub download_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            batch: 1,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            bucket: DEFAULT_BUCKET.to_string(),
            parallelism: 0,
            verify_downloads: false,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
        }
    }
}

impl RunOptions {
    /// Final component of the upload root, used in the banner and log name.
    pub fn context_dir_name(&self) -> String {
        self.upload_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.upload_dir.display().to_string())
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir
            .join(log_file_name(&self.label, &self.context_dir_name()))
    }
}
