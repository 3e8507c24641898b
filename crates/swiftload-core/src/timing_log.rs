//! Append-only timing log.
//!
//! Line formats (left-justified, width 12):
//!
//! ```text
//! <seconds %-12.4f>:<description>
//! <seconds %-12.4f><bytes %-12d>:<description>
//! ```
//!
//! Write failures are reported to the operator and otherwise ignored.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};

use crate::pipeline::TimingRecord;

pub const SEPARATOR: &str = "----------";

/// `<label>_swift_<context dir>.log`
pub fn log_file_name(label: &str, context_dir: &str) -> String {
    format!("{label}_swift_{context_dir}.log")
}

pub fn format_banner(label: &str, context_dir: &str) -> String {
    format!(":using the swift api on {label} for directory '{context_dir}'\n")
}

pub fn format_phase(seconds: f64, description: &str) -> String {
    format!("{seconds:<12.4}:{description}\n")
}

fn format_sized(seconds: f64, bytes: u64, description: &str) -> String {
    format!("{seconds:<12.4}{bytes:<12}:{description}\n")
}

/// The upload, download and delete lines for one object, in that order.
pub fn format_object(record: &TimingRecord) -> [String; 3] {
    let path = &record.object_path;
    [
        format_sized(
            record.upload_seconds,
            record.size_bytes,
            &format!("uploading object - {path}"),
        ),
        format_sized(
            record.download_seconds,
            record.size_bytes,
            &format!("downloading object - {path}"),
        ),
        format_sized(
            record.delete_seconds,
            record.size_bytes,
            &format!("deleting object - {path}"),
        ),
    ]
}

pub fn format_footer(total_seconds: f64) -> String {
    format!(
        "{SEPARATOR}\n{total_seconds:<12.4}:total time for operations\n\n\n"
    )
}

/// Single writer for the per-label log file.
#[derive(Debug)]
pub struct TimingLog {
    path: PathBuf,
    file: File,
}

impl TimingLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Could not create the log file '{}'", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn banner(&mut self, label: &str, context_dir: &str) {
        self.write(&format_banner(label, context_dir));
    }

    pub fn phase(&mut self, seconds: f64, description: &str) {
        self.write(&format_phase(seconds, description));
    }

    pub fn object(&mut self, record: &TimingRecord) {
        for line in format_object(record) {
            self.write(&line);
        }
    }

    pub fn footer(&mut self, total_seconds: f64) {
        self.write(&format_footer(total_seconds));
    }

    fn write(&mut self, line: &str) {
        if let Err(err) = self.file.write_all(line.as_bytes()) {
            log::error!(
                "Could not write to log file '{}': {err}",
                self.path.display()
            );
        }
    }
}
