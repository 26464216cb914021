// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The on-disk job record.
//!
//! One JSON document per live job, stored at `record.file`. The path is the
//! job's stable identity; everything else in the document can be rewritten by
//! a checkpoint. The scheduler only ever observes complete documents — the
//! checkpoint protocol in grove-storage guarantees that.

use crate::colour::Colour;
use crate::task::TaskSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single job in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Absolute path of this record on disk.
    pub file: PathBuf,
    /// Path of the parent job's record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<PathBuf>,
    pub colour: Colour,
    /// Retries left before a failure becomes permanent.
    pub remaining_retry_count: u32,
    /// Direct children created so far.
    pub child_count: u32,
    /// Direct children that have reached terminal success.
    /// Invariant: `black_child_count <= child_count`.
    pub black_child_count: u32,
    /// Unborn child descriptors appended by the worker; drained by the
    /// scheduler when it gives birth to them.
    #[serde(default)]
    pub children: Vec<TaskSpec>,
    /// Follow-on descriptors; the last element is the next command to run.
    /// The worker pops the executed entry before reporting success.
    #[serde(default)]
    pub follow_ons: Vec<TaskSpec>,
    /// Log file written by the task body. Must exist while the record exists.
    pub log_file: PathBuf,
    /// Log file written by the worker wrapper. Must exist while the record
    /// exists.
    pub slave_log_file: PathBuf,
    /// Worker scratch directory.
    pub global_temp_dir: PathBuf,
    /// Per-job stats accumulator, present only when stats are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PathBuf>,
    pub job_creation_time: DateTime<Utc>,
    /// Estimated wall time inherited from the spawning descriptor.
    #[serde(default)]
    pub total_time: f64,
    /// Target wall time per job, echoed to workers.
    pub job_time: f64,
    pub max_log_file_size: u64,
    pub default_memory: u64,
    pub default_cpu: u32,
    /// Environment snapshot the worker sources before running the command.
    pub environment_file: PathBuf,
    /// Log level string workers inherit from the master.
    pub log_level: String,
}

impl JobRecord {
    /// The next command to run: the last element of `follow_ons`.
    pub fn next_follow_on(&self) -> Option<&TaskSpec> {
        self.follow_ons.last()
    }

    pub fn has_unborn_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// All created children have reached terminal success.
    pub fn is_parent_complete(&self) -> bool {
        self.black_child_count == self.child_count
    }

    /// The counter invariant that must hold on every record.
    pub fn counters_consistent(&self) -> bool {
        self.black_child_count <= self.child_count
    }

    pub fn parent_path(&self) -> Option<&Path> {
        self.parent.as_deref()
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
