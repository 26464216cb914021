// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! grove master daemon (groved)
//!
//! Drives one job tree to completion on the local host:
//! `groved <config.toml>`. If the job-file directory is empty, the root job
//! is created from the `[root]` section of the config; otherwise the
//! existing tree is recovered and resumed. Exits zero only when every job
//! succeeded.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::{Path, PathBuf};

use grove_adapters::LocalBatch;
use grove_core::{MasterConfig, SystemClock};
use grove_engine::{Master, MasterError};
use tracing::{error, info};

fn main() {
    let mut args = std::env::args().skip(1);
    let config_path = match args.next() {
        Some(arg) => match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("groved {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--help" | "-h" | "help" => {
                print_help();
                return;
            }
            _ => PathBuf::from(arg),
        },
        None => {
            eprintln!("error: missing config file");
            eprintln!("Usage: groved <config.toml>");
            std::process::exit(2);
        }
    };
    if let Some(extra) = args.next() {
        eprintln!("error: unexpected argument '{extra}'");
        eprintln!("Usage: groved <config.toml>");
        std::process::exit(2);
    }

    let config = match MasterConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: failed to set up logging: {e}");
            std::process::exit(2);
        }
    };

    match run_master(config) {
        Ok(0) => {
            info!("workflow complete");
            println!("workflow complete, 0 residual jobs");
        }
        Ok(residual) => {
            error!(residual, "workflow finished with failed jobs");
            eprintln!("workflow finished with {residual} residual job records");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "master aborted");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn run_master(config: MasterConfig) -> Result<usize, MasterError> {
    let root_spec = config.root.clone();
    let mut master = Master::new(config, LocalBatch::new(), SystemClock)?;

    // A fresh tree gets its root from the config; a non-empty directory is a
    // crashed run to resume.
    if master.store().list_job_files()?.is_empty() {
        let Some(spec) = root_spec else {
            return Err(MasterError::Invariant(
                "job directory is empty and the config has no [root] task".to_string(),
            ));
        };
        let root = master.bootstrap(spec)?;
        info!(root = %root.display(), "bootstrapped a fresh job tree");
    } else {
        info!("resuming an existing job tree");
    }

    master.run()
}

fn print_help() {
    println!("groved {}", env!("CARGO_PKG_VERSION"));
    println!("grove master daemon - runs a tree of dependent jobs to completion");
    println!();
    println!("USAGE:");
    println!("    groved <config.toml>");
    println!();
    println!("The config file names the job, log and scratch directories, the");
    println!("worker command, and (for a fresh tree) the [root] task. Crashed");
    println!("runs are resumed by pointing groved at the same config again.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

/// Install tracing: to the configured master log file when set, stderr
/// otherwise. Rotation happens at startup, before the appender opens.
fn setup_logging(
    config: &MasterConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let Some(log_path) = &config.master_log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    rotate_log_if_needed(log_path);

    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("master_log_file has no file name"))?;

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(Some(guard))
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (master.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the master log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `master.log` → `master.log.1` → `master.log.2` → `master.log.3`,
/// deleting the oldest. Best-effort: rotation failures do not stop startup.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}
