// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The batch-system contract the master schedules against.
//!
//! A backend owns the actual execution of worker commands. The master only
//! ever observes it through this polling surface; nothing here blocks on a
//! job finishing.

use grove_core::BatchId;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

mod local;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use local::LocalBatch;

/// Errors from batch-system operations
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One submission: a worker command plus its resource requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJobSpec {
    pub command: String,
    /// Memory requirement in bytes.
    pub memory: u64,
    pub cpu: u32,
    /// Where the backend should send the worker's stdout/stderr.
    pub slave_log_file: PathBuf,
}

/// External executor of worker commands.
///
/// Contract: `get_issued_job_ids()` is a superset of
/// `get_running_job_ids().keys()`, and the backend never reports an id it
/// was not given work for.
pub trait BatchSystem {
    /// Submit a batch of commands. Returns the new id for each command;
    /// commands within one call must be distinct.
    fn issue_jobs(
        &mut self,
        specs: Vec<BatchJobSpec>,
    ) -> Result<HashMap<BatchId, String>, BatchError>;

    /// Completions since the last call. Draining: each pair is reported
    /// exactly once.
    fn get_updated_jobs(&mut self) -> HashMap<BatchId, i32>;

    /// Currently running jobs with their wall time in seconds.
    fn get_running_job_ids(&mut self) -> HashMap<BatchId, f64>;

    /// Every id issued and not yet finished.
    fn get_issued_job_ids(&self) -> HashSet<BatchId>;

    /// Best-effort synchronous kill.
    fn kill_jobs(&mut self, ids: &[BatchId]) -> Result<(), BatchError>;
}
