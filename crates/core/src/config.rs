// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master configuration, loaded from a TOML file.

use crate::task::TaskSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Durations at or above this many seconds disable the over-long rescue.
pub const MAX_JOB_DURATION_NEVER: f64 = 1.0e7;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Typed options driving one master process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Initial `remaining_retry_count` for new jobs and for the recovery
    /// reset.
    pub retry_count: u32,
    /// Target wall time per job in seconds; echoed to workers.
    pub job_time: f64,
    /// Kill threshold in seconds; values >= [`MAX_JOB_DURATION_NEVER`]
    /// disable the over-long rescue.
    pub max_job_duration: f64,
    /// Upper bound on jobs in flight at the batch system.
    pub max_jobs: usize,
    /// Main-loop sleep between iterations, in seconds.
    pub wait_duration: f64,
    /// Minimum seconds between rescue passes.
    pub rescue_jobs_frequency: f64,
    /// Memory in bytes written into new records as the batch default.
    pub default_memory: u64,
    /// CPUs written into new records as the batch default.
    pub default_cpu: u32,
    /// Root for job record files.
    pub job_file_dir: PathBuf,
    /// Root for task log files (and stats files, when enabled).
    pub log_file_dir: PathBuf,
    /// Root for worker wrapper log files.
    pub slave_log_file_dir: PathBuf,
    /// Root for worker scratch directories.
    pub temp_dir_dir: PathBuf,
    /// Environment snapshot exposed to workers.
    pub environment_file: PathBuf,
    /// Truncation hint echoed to workers.
    pub max_log_file_size: u64,
    /// Global stats file; enables per-job stats aggregation when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PathBuf>,
    /// Command prefix that launches the worker binary; the master appends
    /// `--job <record path>`.
    pub worker_command: String,
    /// Log level echoed into records for workers.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Master log file; stderr is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_log_file: Option<PathBuf>,
    /// Bootstrap descriptor for the root job, used by `groved` when the job
    /// directory is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<TaskSpec>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl MasterConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the main loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_duration < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "wait_duration must be >= 0, got {}",
                self.wait_duration
            )));
        }
        if self.max_job_duration < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_job_duration must be >= 0, got {}",
                self.max_job_duration
            )));
        }
        if self.job_time <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "job_time must be > 0, got {}",
                self.job_time
            )));
        }
        if self.max_jobs == 0 {
            return Err(ConfigError::Invalid("max_jobs must be >= 1".to_string()));
        }
        if self.worker_command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "worker_command must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the over-long rescue is disabled.
    pub fn max_job_duration_disabled(&self) -> bool {
        self.max_job_duration >= MAX_JOB_DURATION_NEVER
    }

    pub fn stats_enabled(&self) -> bool {
        self.stats.is_some()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
