pub mod checksum;
pub mod collector;
pub mod config;
pub mod directories;
pub mod enumeration;
pub mod errors;
pub mod orchestrator;
pub mod pipeline;
pub mod pool;
pub mod store;
pub mod timing_log;

pub use errors::{ItemError, SetupError, SetupPhase, Stage, EXIT_FATAL};
pub use orchestrator::{BatchSummary, LoadTestOrchestrator, RunOptions, RunSummary};
