use std::path::PathBuf;
use std::time::Duration;

use crate::collector::RunTotals;
use crate::errors::ItemError;

/// Outcome of one batch iteration.
#[derive(Clone, Debug, Default)]
pub struct BatchSummary {
    /// 1-based iteration number.
    pub iteration: u32,
    pub totals: RunTotals,
    pub files: usize,
    pub directories: usize,
    pub directories_created: usize,
    pub directories_unchanged: usize,
    pub directories_deleted: usize,
    pub directory_failures: Vec<ItemError>,
    pub object_errors: Vec<ItemError>,
    /// Pipeline outcomes lost to a dead task.
    pub missing: usize,
    pub container_deleted: bool,
    pub duration: Duration,
}

impl BatchSummary {
    pub fn is_clean(&self) -> bool {
        self.directory_failures.is_empty()
            && self.object_errors.is_empty()
            && self.missing == 0
            && self.container_deleted
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub batches: Vec<BatchSummary>,
    pub log_file: PathBuf,
}

impl RunSummary {
    pub fn total_seconds(&self) -> f64 {
        self.batches.iter().map(|b| b.totals.total_seconds).sum()
    }
}
