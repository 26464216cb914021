// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job store: creating, loading and deleting job records and their side
//! files.
//!
//! The store only hands out in-memory records; making a new record durable is
//! the caller's business, via [`crate::CheckpointWriter`].

use chrono::Utc;
use grove_core::{Colour, JobRecord, MasterConfig, TaskSpec};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::tempdir::TempFileTree;

/// Errors from job store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt job record at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Read a job record document from disk.
pub fn read_record(path: &Path) -> Result<JobRecord, StoreError> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_owned(),
        message: e.to_string(),
    })
}

/// Serialize a job record document. Pretty-printed so operators can read a
/// stuck tree with a pager.
pub fn encode_record(job: &JobRecord) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec_pretty(job)?)
}

/// Owns the four path trees a job's files live in.
#[derive(Debug)]
pub struct JobStore {
    job_files: TempFileTree,
    log_files: TempFileTree,
    slave_log_files: TempFileTree,
    temp_dirs: TempFileTree,
    stats_enabled: bool,
}

impl JobStore {
    /// Open the trees named by the configuration, creating roots as needed.
    pub fn open(config: &MasterConfig) -> Result<Self, StoreError> {
        Ok(Self {
            job_files: TempFileTree::new(&config.job_file_dir)?,
            log_files: TempFileTree::new(&config.log_file_dir)?,
            slave_log_files: TempFileTree::new(&config.slave_log_file_dir)?,
            temp_dirs: TempFileTree::new(&config.temp_dir_dir)?,
            stats_enabled: config.stats_enabled(),
        })
    }

    /// Build a fresh white record for `spec`, allocating every side path.
    ///
    /// The returned record is in memory only; checkpoint it before acting on
    /// it.
    pub fn create(
        &self,
        spec: TaskSpec,
        parent: Option<&Path>,
        config: &MasterConfig,
    ) -> Result<JobRecord, StoreError> {
        let file = self.job_files.get_temp_file(".json")?;
        let log_file = self.log_files.get_temp_file(".log")?;
        let slave_log_file = self.slave_log_files.get_temp_file(".log")?;
        let global_temp_dir = self.temp_dirs.get_temp_dir()?;
        let stats = if self.stats_enabled {
            Some(self.log_files.get_temp_file(".stats")?)
        } else {
            None
        };

        let total_time = spec.time;
        let follow_on = spec.with_defaults(config.default_memory, config.default_cpu);

        Ok(JobRecord {
            file,
            parent: parent.map(Path::to_owned),
            colour: Colour::White,
            remaining_retry_count: config.retry_count,
            child_count: 0,
            black_child_count: 0,
            children: Vec::new(),
            follow_ons: vec![follow_on],
            log_file,
            slave_log_file,
            global_temp_dir,
            stats,
            job_creation_time: Utc::now(),
            total_time,
            job_time: config.job_time,
            max_log_file_size: config.max_log_file_size,
            default_memory: config.default_memory,
            default_cpu: config.default_cpu,
            environment_file: config.environment_file.clone(),
            log_level: config.log_level.clone(),
        })
    }

    pub fn load(&self, path: &Path) -> Result<JobRecord, StoreError> {
        read_record(path)
    }

    /// Reclaim every path belonging to a job. Called exactly once, at the
    /// dead transition.
    pub fn delete(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.log_files.destroy_file(&job.log_file)?;
        self.slave_log_files.destroy_file(&job.slave_log_file)?;
        self.temp_dirs.destroy_dir(&job.global_temp_dir)?;
        self.job_files.destroy_file(&job.file)?;
        if let Some(stats) = &job.stats {
            self.log_files.destroy_file(stats)?;
        }
        Ok(())
    }

    /// Everything in the job-file directory: records plus any `.new` or
    /// `.updating` leftovers from an interrupted checkpoint.
    pub fn list_job_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        self.job_files.list_files()
    }

    /// Reclaim a single file from the job-file tree (recovery cleanup).
    pub fn destroy_job_file(&self, path: &Path) -> Result<(), StoreError> {
        self.job_files.destroy_file(path)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
pub(crate) mod tests;
