// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local batch backend: runs each worker command as a child process on this
//! host.
//!
//! Resource requirements are accepted and ignored beyond logging; the local
//! host has whatever it has. The master's `max_jobs` bound is the real
//! concurrency limit.

use super::{BatchError, BatchJobSpec, BatchSystem};
use grove_core::BatchId;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::process::{Child, Command, Stdio};
use std::time::Instant;
use tracing::{debug, warn};

struct RunningJob {
    child: Child,
    command: String,
    started: Instant,
}

/// Child-process batch system.
#[derive(Default)]
pub struct LocalBatch {
    next_id: u64,
    running: HashMap<BatchId, RunningJob>,
    finished: HashMap<BatchId, i32>,
}

impl LocalBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn(&self, spec: &BatchJobSpec) -> Result<Child, BatchError> {
        let log = File::create(&spec.slave_log_file)?;
        let log_err = log.try_clone()?;
        Command::new("sh")
            .arg("-c")
            .arg(&spec.command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|source| BatchError::Spawn {
                command: spec.command.clone(),
                source,
            })
    }

    /// Reap any children that have exited since the last poll.
    fn reap(&mut self) {
        let mut done = Vec::new();
        for (id, job) in &mut self.running {
            match job.child.try_wait() {
                Ok(Some(status)) => {
                    // A signal death has no exit code; report it as failure.
                    let code = status.code().unwrap_or(1);
                    debug!(id = %id, code, command = %job.command, "local job finished");
                    done.push((*id, code));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(id = %id, error = %e, "failed to poll local job, treating as failed");
                    done.push((*id, 1));
                }
            }
        }
        for (id, code) in done {
            self.running.remove(&id);
            self.finished.insert(id, code);
        }
    }
}

impl BatchSystem for LocalBatch {
    fn issue_jobs(
        &mut self,
        specs: Vec<BatchJobSpec>,
    ) -> Result<HashMap<BatchId, String>, BatchError> {
        let mut issued = HashMap::new();
        for spec in specs {
            let child = self.spawn(&spec)?;
            self.next_id += 1;
            let id = BatchId(self.next_id);
            debug!(
                id = %id,
                pid = child.id(),
                memory = spec.memory,
                cpu = spec.cpu,
                command = %spec.command,
                "issued local job"
            );
            self.running.insert(
                id,
                RunningJob {
                    child,
                    command: spec.command.clone(),
                    started: Instant::now(),
                },
            );
            issued.insert(id, spec.command);
        }
        Ok(issued)
    }

    fn get_updated_jobs(&mut self) -> HashMap<BatchId, i32> {
        self.reap();
        std::mem::take(&mut self.finished)
    }

    fn get_running_job_ids(&mut self) -> HashMap<BatchId, f64> {
        self.reap();
        self.running
            .iter()
            .map(|(id, job)| (*id, job.started.elapsed().as_secs_f64()))
            .collect()
    }

    fn get_issued_job_ids(&self) -> HashSet<BatchId> {
        // Finished-but-undrained jobs still count as issued; they leave the
        // set when get_updated_jobs reports them.
        self.running
            .keys()
            .chain(self.finished.keys())
            .copied()
            .collect()
    }

    fn kill_jobs(&mut self, ids: &[BatchId]) -> Result<(), BatchError> {
        for id in ids {
            if let Some(mut job) = self.running.remove(id) {
                if let Err(e) = job.child.kill() {
                    warn!(id = %id, error = %e, "kill failed");
                }
                // Reap so the pid is not leaked; the master synthesises the
                // failed completion itself.
                let _ = job.child.wait();
                debug!(id = %id, command = %job.command, "killed local job");
            }
            self.finished.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
