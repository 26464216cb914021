// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch of white jobs to the batch backend and the live id → record map.

use grove_adapters::{BatchJobSpec, BatchSystem};
use grove_core::{BatchId, JobRecord, MasterConfig};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{invariant, MasterError};

/// Maps live batch ids back to the record paths they are running.
///
/// Every entry was preceded by a grey checkpoint of its record, so a crash
/// between submit and map insert is recovered by the grey → white reset on
/// restart.
#[derive(Debug, Default)]
pub struct Dispatcher {
    live: HashMap<BatchId, PathBuf>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn contains(&self, id: BatchId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn path_for(&self, id: BatchId) -> Option<&Path> {
        self.live.get(&id).map(PathBuf::as_path)
    }

    pub fn remove(&mut self, id: BatchId) -> Option<PathBuf> {
        self.live.remove(&id)
    }

    pub fn ids(&self) -> HashSet<BatchId> {
        self.live.keys().copied().collect()
    }

    /// Submit `jobs` to the backend and record the returned ids.
    ///
    /// The command embeds the record path, which keeps commands distinct
    /// within a batch; a duplicate means two jobs share a record file and is
    /// fatal.
    pub fn issue<B: BatchSystem>(
        &mut self,
        jobs: &[&JobRecord],
        batch: &mut B,
        config: &MasterConfig,
    ) -> Result<(), MasterError> {
        let mut by_command: HashMap<String, PathBuf> = HashMap::new();
        let mut specs = Vec::with_capacity(jobs.len());

        for job in jobs {
            let follow_on = job.next_follow_on().ok_or_else(|| {
                MasterError::Invariant(format!(
                    "job {} has no follow-on to issue",
                    job.file.display()
                ))
            })?;
            let command = format!("{} --job {}", config.worker_command, job.file.display());
            invariant!(
                by_command
                    .insert(command.clone(), job.file.clone())
                    .is_none(),
                "duplicate command in issue batch: {command}"
            );
            specs.push(BatchJobSpec {
                command,
                memory: follow_on.memory,
                cpu: follow_on.cpu,
                slave_log_file: job.slave_log_file.clone(),
            });
        }

        let issued = batch.issue_jobs(specs)?;
        invariant!(
            issued.len() == by_command.len(),
            "batch system returned {} ids for {} submissions",
            issued.len(),
            by_command.len()
        );

        for (id, command) in issued {
            let path = by_command.get(&command).ok_or_else(|| {
                MasterError::Invariant(format!(
                    "batch system echoed an unknown command: {command}"
                ))
            })?;
            invariant!(
                !self.live.contains_key(&id),
                "batch system reused live id {id}"
            );
            debug!(job = %path.display(), id = %id, "issued job");
            self.live.insert(id, path.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
