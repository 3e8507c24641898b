use std::path::PathBuf;
use std::time::Duration;

use eyre::{bail, Context, Result};
use swiftload_core::config::{load_config_file, FileConfig, Identity};
use swiftload_core::errors::{SetupContext, SetupError, SetupPhase};
use swiftload_core::orchestrator::{
    RunOptions, DEFAULT_BUCKET, DEFAULT_DOWNLOAD_DIR, DEFAULT_LABEL, DEFAULT_LOG_DIR,
    DEFAULT_UPLOAD_DIR,
};
use swiftload_core::store::swift::SwiftOptions;

use crate::cli::Cli;

pub const DEFAULT_ENDPOINT: &str = "https://auth-east.cloud.ca/v2.0";

#[derive(Debug)]
pub struct Settings {
    pub run: RunOptions,
    pub swift: SwiftOptions,
    pub verbose: bool,
}

/// Merge flags over the config file over built-in defaults.
pub fn resolve(cli: &Cli) -> Result<Settings, SetupError> {
    merge(cli).phase(SetupPhase::Flags)
}

fn merge(cli: &Cli) -> Result<Settings> {
    let file = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => FileConfig::default(),
    };
    let run = file.run;
    let swift = file.swift;

    let label = cli
        .label
        .clone()
        .or(run.label)
        .unwrap_or_else(|| DEFAULT_LABEL.to_string());
    let batch = cli.batch.or(run.batch).unwrap_or(1);
    if batch == 0 {
        bail!("'batch' must be at least 1");
    }
    let dir = cli
        .dir
        .clone()
        .or(run.dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
    let bucket = cli
        .bucket
        .clone()
        .or(run.bucket)
        .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
    let identity = cli.identity.clone().or(swift.identity).unwrap_or_default();
    let password = cli.password.clone().or(swift.password).unwrap_or_default();

    if dir.as_os_str().is_empty() || bucket.is_empty() || identity.is_empty() || password.is_empty()
    {
        bail!("'dir', 'bucket', 'identity' and 'password' are required");
    }
    let identity = Identity::parse(&identity)?;

    let upload_dir = std::path::absolute(&dir)
        .with_context(|| format!("failed to resolve directory {}", dir.display()))?;
    if !upload_dir.is_dir() {
        bail!("directory '{}' does not exist", upload_dir.display());
    }

    let endpoint = cli
        .endpoint
        .clone()
        .or(swift.endpoint)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    Ok(Settings {
        run: RunOptions {
            label,
            batch,
            upload_dir,
            bucket,
            parallelism: cli.parallelism.or(run.parallelism).unwrap_or(0),
            verify_downloads: cli.verify || run.verify.unwrap_or(false),
            log_dir: cli
                .log_dir
                .clone()
                .or(run.log_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            download_dir: cli
                .download_dir
                .clone()
                .or(run.download_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
        },
        swift: SwiftOptions {
            auth_url: endpoint,
            tenant: identity.tenant,
            username: identity.username,
            password,
            insecure: cli.insecure || swift.insecure.unwrap_or(false),
            timeout: cli.timeout.or(swift.timeout_secs).map(Duration::from_secs),
        },
        verbose: cli.verbose,
    })
}
