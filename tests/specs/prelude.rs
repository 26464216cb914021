//! Shared helpers for the master specs.

use grove_adapters::FakeBatch;
use grove_core::{Colour, FakeClock, MasterConfig};
use grove_engine::Master;
use grove_storage::{read_record, CheckpointWriter};
use std::path::{Path, PathBuf};

pub use grove_core::TaskSpec;

pub struct Harness {
    pub master: Master<FakeBatch, FakeClock>,
    pub clock: FakeClock,
    pub _dir: tempfile::TempDir,
}

pub fn test_config(root: &Path) -> MasterConfig {
    MasterConfig {
        retry_count: 2,
        job_time: 600.0,
        max_job_duration: 1.0e7,
        max_jobs: 4,
        wait_duration: 0.0,
        rescue_jobs_frequency: 3600.0,
        default_memory: 1 << 30,
        default_cpu: 1,
        job_file_dir: root.join("jobs"),
        log_file_dir: root.join("logs"),
        slave_log_file_dir: root.join("slave-logs"),
        temp_dir_dir: root.join("tmp"),
        environment_file: root.join("environment"),
        max_log_file_size: 50_000,
        stats: None,
        worker_command: "grove-worker".to_string(),
        log_level: "info".to_string(),
        master_log_file: None,
        root: None,
    }
}

pub fn harness(batch: FakeBatch, tweak: impl FnOnce(&mut MasterConfig)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    tweak(&mut config);
    let clock = FakeClock::new();
    let master = Master::new(config, batch, clock.clone()).unwrap();
    Harness {
        master,
        clock,
        _dir: dir,
    }
}

/// The record path embedded in an issued worker command.
pub fn job_path(command: &str) -> PathBuf {
    let (_, path) = command
        .split_once("--job ")
        .expect("worker command carries --job");
    PathBuf::from(path)
}

/// A worker body that succeeds: pops the executed follow-on, optionally
/// registers children, goes black and checkpoints — exactly what the worker
/// contract requires on exit status zero.
pub fn finish_ok(path: &Path, children: Vec<TaskSpec>) {
    let mut job = read_record(path).unwrap();
    job.follow_ons.pop();
    job.children.extend(children);
    job.colour = Colour::Black;
    CheckpointWriter::new().commit(&[&job]).unwrap();
}

/// The command the worker was asked to execute: the last follow-on of the
/// record it was handed.
pub fn executed_command(path: &Path) -> String {
    let job = read_record(path).unwrap();
    job.follow_ons.last().unwrap().command.clone()
}
