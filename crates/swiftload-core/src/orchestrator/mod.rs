//! Batch sequencing for a load-test run.
//!
//! One batch runs these phases strictly in order:
//! connect, authenticate, create container, walk, directory placeholders,
//! object pipeline with result collection, placeholder deletion, container
//! deletion, local download cleanup. A failure before the walk completes
//! is fatal; later failures are per item and the batch carries on.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use eyre::{Context, Report};

use crate::collector::{collect_results, RunTotals};
use crate::directories::DirectoryLifecycle;
use crate::enumeration::TreeWalker;
use crate::errors::{SetupContext, SetupError, SetupPhase};
use crate::pipeline::{spawn_pipeline, ObjectWorker};
use crate::store::{ObjectStore, StoreConnector};
use crate::timing_log::TimingLog;

mod options;
mod summary;

pub use options::{
    RunOptions, DEFAULT_BUCKET, DEFAULT_DOWNLOAD_DIR, DEFAULT_LABEL, DEFAULT_LOG_DIR,
    DEFAULT_UPLOAD_DIR,
};
pub use summary::{BatchSummary, RunSummary};

pub struct LoadTestOrchestrator {
    connector: Arc<dyn StoreConnector>,
    options: RunOptions,
}

impl LoadTestOrchestrator {
    pub fn new(connector: impl StoreConnector + 'static, options: RunOptions) -> Self {
        Self {
            connector: Arc::new(connector),
            options,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, SetupError> {
        self.run_with(|_| {}).await
    }

    /// Run every batch, handing each summary to `on_batch` as soon as the
    /// batch is finished.
    pub async fn run_with<F>(&self, mut on_batch: F) -> Result<RunSummary, SetupError>
    where
        F: FnMut(&BatchSummary),
    {
        let mut timing_log = self.bootstrap()?;
        let mut summary = RunSummary {
            batches: Vec::with_capacity(self.options.batch as usize),
            log_file: timing_log.path().to_path_buf(),
        };

        for iteration in 1..=self.options.batch {
            match self.run_batch(iteration, &mut timing_log).await {
                Ok(batch) => {
                    on_batch(&batch);
                    summary.batches.push(batch);
                }
                Err(err) => {
                    remove_downloads(&self.options.download_dir).await;
                    return Err(err);
                }
            }
        }

        Ok(summary)
    }

    fn bootstrap(&self) -> Result<TimingLog, SetupError> {
        let opts = &self.options;
        std::fs::create_dir_all(&opts.log_dir)
            .with_context(|| format!("failed to create {}", opts.log_dir.display()))
            .phase(SetupPhase::Bootstrap)?;
        std::fs::create_dir_all(&opts.download_dir)
            .with_context(|| format!("failed to create {}", opts.download_dir.display()))
            .phase(SetupPhase::Bootstrap)?;
        TimingLog::open(&opts.log_file()).phase(SetupPhase::Bootstrap)
    }

    async fn run_batch(
        &self,
        iteration: u32,
        timing_log: &mut TimingLog,
    ) -> Result<BatchSummary, SetupError> {
        let opts = &self.options;
        let started = Instant::now();
        let mut totals = RunTotals::default();

        timing_log.banner(&opts.label, &opts.context_dir_name());

        let store = self.connector.connect().phase(SetupPhase::Connect)?;
        let clock = Instant::now();
        store
            .authenticate()
            .await
            .phase(SetupPhase::Authenticate)?;
        record_phase(timing_log, &mut totals, clock, "create connection");

        let clock = Instant::now();
        store
            .create_container(&opts.bucket)
            .await
            .phase(SetupPhase::CreateContainer)?;
        record_phase(timing_log, &mut totals, clock, "create container");
        log::info!("Using bucket {}", opts.bucket);
        log::info!("Starting upload...");

        let walker = TreeWalker::new(opts.download_dir.clone());
        let root = opts.upload_dir.clone();
        let tree = tokio::task::spawn_blocking(move || walker.walk(&root))
            .await
            .map_err(Report::new)
            .and_then(|walked| walked)
            .phase(SetupPhase::Walk)?;

        // Earlier batches removed the download root during cleanup.
        tokio::fs::create_dir_all(&opts.download_dir)
            .await
            .with_context(|| format!("failed to create {}", opts.download_dir.display()))
            .phase(SetupPhase::Bootstrap)?;

        let mut batch = BatchSummary {
            iteration,
            files: tree.files.len(),
            directories: tree.directories.len(),
            ..BatchSummary::default()
        };

        let lifecycle = DirectoryLifecycle::new(Arc::clone(&store), &opts.bucket, opts.parallelism);
        let created = lifecycle.create_all(&tree.directories).await;
        batch.directories_created = created.created;
        batch.directories_unchanged = created.unchanged;
        batch.directory_failures.extend(created.failures);

        let worker = ObjectWorker::new(Arc::clone(&store), &opts.bucket)
            .verify_downloads(opts.verify_downloads);
        let expected = tree.files.len();
        let (pool, mut results) = spawn_pipeline(worker, tree.files, opts.parallelism);
        let collected = collect_results(&mut results, expected, timing_log, &mut totals).await;
        for joined in pool.join_all().await {
            if let Err(err) = joined {
                log::error!("object task failed: {err}");
            }
        }
        batch.object_errors = collected.errors;
        batch.missing = collected.missing;

        let deleted = lifecycle.delete_all(&tree.directories).await;
        batch.directories_deleted = deleted.deleted;
        batch.directory_failures.extend(deleted.failures);

        let clock = Instant::now();
        batch.container_deleted = delete_container(store.as_ref(), &opts.bucket).await;
        record_phase(timing_log, &mut totals, clock, "delete bucket");

        timing_log.footer(totals.total_seconds);
        remove_downloads(&opts.download_dir).await;

        batch.totals = totals;
        batch.duration = started.elapsed();
        Ok(batch)
    }
}

fn record_phase(timing_log: &mut TimingLog, totals: &mut RunTotals, clock: Instant, what: &str) {
    let seconds = clock.elapsed().as_secs_f64();
    totals.add_seconds(seconds);
    timing_log.phase(seconds, what);
}

/// A failed container delete is reported but does not end the run.
async fn delete_container(store: &dyn ObjectStore, bucket: &str) -> bool {
    match store.delete_container(bucket).await {
        Ok(()) => {
            log::info!("removed bucket: {bucket}");
            true
        }
        Err(err) => {
            log::error!("Problem deleting the bucket '{bucket}': {err:#}");
            false
        }
    }
}

async fn remove_downloads(download_dir: &Path) {
    match tokio::fs::remove_dir_all(download_dir).await {
        Ok(()) => log::info!("removed local temp: {}", download_dir.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => log::warn!(
            "failed to remove local temp {}: {err}",
            download_dir.display()
        ),
    }
}
