//! Single consumer of pipeline outcomes.

use tokio::sync::mpsc;

use crate::errors::ItemError;
use crate::pipeline::{ObjectOutcome, TimingRecord};
use crate::timing_log::TimingLog;

/// Per-batch accumulator. Only the orchestrator and the collector loop
/// touch it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunTotals {
    pub total_seconds: f64,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_uploads: usize,
    pub bytes: u64,
}

impl RunTotals {
    pub fn add_seconds(&mut self, seconds: f64) {
        self.total_seconds += seconds;
    }

    pub fn record(&mut self, record: &TimingRecord) {
        self.add_seconds(record.total_seconds());
        self.succeeded += 1;
        self.bytes += record.size_bytes;
        if record.upload_skipped() {
            self.skipped_uploads += 1;
        }
    }
}

#[derive(Debug, Default)]
pub struct CollectSummary {
    pub received: usize,
    pub errors: Vec<ItemError>,
    /// Outcomes that never arrived because the channel closed early.
    pub missing: usize,
}

/// Drain exactly `expected` outcomes from `rx`.
///
/// Records are written to `timing_log` (upload, download, delete) and folded into
/// `totals`. Errors are reported and counted but write nothing to the log.
pub async fn collect_results(
    rx: &mut mpsc::UnboundedReceiver<ObjectOutcome>,
    expected: usize,
    timing_log: &mut TimingLog,
    totals: &mut RunTotals,
) -> CollectSummary {
    let mut summary = CollectSummary::default();
    while summary.received < expected {
        let Some(outcome) = rx.recv().await else {
            summary.missing = expected - summary.received;
            log::error!(
                "result channel closed with {} outcome(s) outstanding",
                summary.missing
            );
            break;
        };
        summary.received += 1;
        match outcome {
            Ok(record) => {
                timing_log.object(&record);
                totals.record(&record);
            }
            Err(err) => {
                log::error!("{err}");
                totals.failed += 1;
                summary.errors.push(err);
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Stage;
    use std::fs;

    fn record(path: &str, upload: f64, size: u64) -> TimingRecord {
        TimingRecord {
            upload_seconds: upload,
            download_seconds: 0.5,
            delete_seconds: 0.25,
            size_bytes: size,
            object_path: path.to_string(),
        }
    }

    #[tokio::test]
    async fn records_are_logged_and_summed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.log");
        let mut log = TimingLog::open(&path).unwrap();
        let mut totals = RunTotals::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        tx.send(Ok(record("a", 1.0, 10))).unwrap();
        tx.send(Err(ItemError::msg(Stage::Upload, "b", "boom"))).unwrap();
        tx.send(Ok(record("c", 0.0, 5))).unwrap();

        let summary = collect_results(&mut rx, 3, &mut log, &mut totals).await;
        drop(log);

        assert_eq!(summary.received, 3);
        assert_eq!(summary.missing, 0);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(totals.succeeded, 2);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.skipped_uploads, 1);
        assert_eq!(totals.bytes, 15);
        assert!((totals.total_seconds - 2.5).abs() < 1e-9);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].ends_with(":uploading object - a"));
        assert!(lines[1].ends_with(":downloading object - a"));
        assert!(lines[2].ends_with(":deleting object - a"));
        assert!(!contents.contains(" - b"));
    }

    #[tokio::test]
    async fn closed_channel_reports_shortfall() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TimingLog::open(&dir.path().join("t.log")).unwrap();
        let mut totals = RunTotals::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Ok(record("a", 1.0, 1))).unwrap();
        drop(tx);

        let summary = collect_results(&mut rx, 4, &mut log, &mut totals).await;

        assert_eq!(summary.received, 1);
        assert_eq!(summary.missing, 3);
    }

    #[tokio::test]
    async fn stops_after_expected_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TimingLog::open(&dir.path().join("t.log")).unwrap();
        let mut totals = RunTotals::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Ok(record("a", 1.0, 1))).unwrap();
        tx.send(Ok(record("b", 1.0, 1))).unwrap();

        let summary = collect_results(&mut rx, 1, &mut log, &mut totals).await;

        assert_eq!(summary.received, 1);
        assert_eq!(totals.succeeded, 1);
        assert!(rx.try_recv().is_ok());
    }
}
