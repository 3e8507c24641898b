mod cli;
mod settings;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use swiftload_core::errors::{SetupError, SetupPhase};
use swiftload_core::orchestrator::{BatchSummary, LoadTestOrchestrator};
use swiftload_core::store::swift::SwiftConnector;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = color_eyre::install() {
        eprintln!("[warn] failed to install error reporter: {err}");
    }
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match settings::resolve(&cli) {
        Ok(settings) => settings,
        Err(err) => return fail(&err, cli.verbose),
    };
    let log_dir = settings.run.log_dir.clone();
    let verbose = settings.verbose;

    let orchestrator =
        LoadTestOrchestrator::new(SwiftConnector::new(settings.swift), settings.run);
    match orchestrator.run_with(print_batch_summary).await {
        Ok(summary) => {
            log::debug!(
                "timing log: {} ({:.4}s of operations over {} batch(es))",
                summary.log_file.display(),
                summary.total_seconds(),
                summary.batches.len()
            );
            println!(
                "Load test finished! Check the '{}' directory for details...",
                log_dir.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => fail(&err, verbose),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,swiftload_core=debug,swiftload=debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_target(false)
        .init();
}

fn fail(err: &SetupError, verbose: bool) -> ExitCode {
    eprintln!("\nERROR: {}\n{:#}\n", err.phase.headline(), err.source);
    if verbose {
        eprintln!("{:?}", err.source);
    }
    if err.phase == SetupPhase::Flags {
        let _ = Cli::command().print_help();
    }
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}

fn print_batch_summary(batch: &BatchSummary) {
    let totals = &batch.totals;
    println!(
        "Batch {} complete: {} file(s) ok, {} failed, {} upload(s) skipped, {} in {:.4}s of operations ({:.2?} wall)",
        batch.iteration,
        totals.succeeded,
        totals.failed + batch.missing,
        totals.skipped_uploads,
        format_bytes(totals.bytes),
        totals.total_seconds,
        batch.duration
    );
    if batch.directories > 0 {
        println!(
            "  directories: {} created, {} unchanged, {} deleted",
            batch.directories_created, batch.directories_unchanged, batch.directories_deleted
        );
    }
    for failure in &batch.directory_failures {
        eprintln!("  [warn] {failure}");
    }
    if !batch.container_deleted {
        eprintln!("  [warn] bucket was not deleted");
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes == 0 {
        return "0 B".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(4), "4 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MiB");
    }
}
