use clap::Parser;
use std::path::PathBuf;

/// Options left unset here fall back to the `--config` file, then to the
/// built-in defaults shown in brackets.
#[derive(Parser, Debug)]
#[command(name = "swiftload")]
#[command(about = "Load-test a Swift object store by round-tripping a directory tree")]
pub struct Cli {
    /// TOML file supplying defaults for any option below
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Label for the log file name and banner [default: label]
    #[arg(long)]
    pub label: Option<String>,
    /// Number of full upload/download/delete cycles [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch: Option<u32>,
    /// Directory tree to upload [default: uploads/small]
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,
    /// Bucket (container) created and deleted by every batch
    /// [default: global_unique_bucket_name_12345]
    #[arg(long)]
    pub bucket: Option<String>,
    /// Keystone v2 auth URL [default: https://auth-east.cloud.ca/v2.0]
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
    /// Credentials as <tenant>:<username>
    #[arg(long)]
    pub identity: Option<String>,
    /// Password for the identity
    #[arg(long, env = "SWIFTLOAD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
    /// Maximum in-flight tasks per phase (0 = one task per item)
    #[arg(long, value_name = "N")]
    pub parallelism: Option<usize>,
    /// Per-request HTTP deadline in seconds (unset = no deadline)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Re-hash every download and compare it with the local file
    #[arg(long)]
    pub verify: bool,
    /// Where timing logs are appended [default: logs]
    #[arg(long, value_name = "PATH")]
    pub log_dir: Option<PathBuf>,
    /// Scratch directory for downloads, removed after every batch
    /// [default: downloads]
    #[arg(long, value_name = "PATH")]
    pub download_dir: Option<PathBuf>,
    /// Debug-level logging and full error reports
    #[arg(short, long)]
    pub verbose: bool,
}
