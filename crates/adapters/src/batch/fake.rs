// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic in-memory batch system for tests.
//!
//! Jobs "run" by invoking an optional worker closure when completions are
//! polled, so a whole master run can execute synchronously inside one test.
//! Ids can be hidden from the issued listing to simulate a backend losing
//! track of a job.

use super::{BatchError, BatchJobSpec, BatchSystem};
use grove_core::BatchId;
use std::collections::{BTreeMap, HashMap, HashSet};

type WorkerFn = Box<dyn FnMut(&str) -> i32>;

/// Scripted batch backend.
#[derive(Default)]
pub struct FakeBatch {
    next_id: u64,
    issued: BTreeMap<BatchId, String>,
    pending: Vec<(BatchId, i32)>,
    hidden: HashSet<BatchId>,
    hide_needles: Vec<String>,
    killed: Vec<BatchId>,
    issue_log: Vec<String>,
    wall_times: HashMap<BatchId, f64>,
    worker: Option<WorkerFn>,
}

impl FakeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `worker` for each issued command when completions are polled; its
    /// return value is the exit status. Without a worker, jobs sit issued
    /// until a test completes or kills them.
    pub fn with_worker(worker: impl FnMut(&str) -> i32 + 'static) -> Self {
        Self {
            worker: Some(Box::new(worker)),
            ..Self::default()
        }
    }

    /// Queue an explicit completion report (the id need not be issued —
    /// duplicate reporting is part of the contract under test).
    pub fn push_completion(&mut self, id: BatchId, status: i32) {
        self.pending.push((id, status));
    }

    /// Drop `id` from the issued listing while leaving it un-completed.
    pub fn hide(&mut self, id: BatchId) {
        self.hidden.insert(id);
    }

    /// Hide every future submission whose command contains `needle`, as if
    /// the backend lost it the moment it was handed over.
    pub fn hide_on_issue(&mut self, needle: impl Into<String>) {
        self.hide_needles.push(needle.into());
    }

    pub fn set_wall_time(&mut self, id: BatchId, seconds: f64) {
        self.wall_times.insert(id, seconds);
    }

    pub fn killed(&self) -> &[BatchId] {
        &self.killed
    }

    /// Every command ever issued, in submission order.
    pub fn issue_log(&self) -> &[String] {
        &self.issue_log
    }

    pub fn id_for_command_containing(&self, needle: &str) -> Option<BatchId> {
        self.issued
            .iter()
            .find(|(_, command)| command.contains(needle))
            .map(|(id, _)| *id)
    }
}

impl BatchSystem for FakeBatch {
    fn issue_jobs(
        &mut self,
        specs: Vec<BatchJobSpec>,
    ) -> Result<HashMap<BatchId, String>, BatchError> {
        let mut result = HashMap::new();
        for spec in specs {
            self.next_id += 1;
            let id = BatchId(self.next_id);
            if self.hide_needles.iter().any(|n| spec.command.contains(n)) {
                self.hidden.insert(id);
            }
            self.issued.insert(id, spec.command.clone());
            self.issue_log.push(spec.command.clone());
            result.insert(id, spec.command);
        }
        Ok(result)
    }

    fn get_updated_jobs(&mut self) -> HashMap<BatchId, i32> {
        let mut updated: HashMap<BatchId, i32> = self.pending.drain(..).collect();

        if let Some(worker) = self.worker.as_mut() {
            let runnable: Vec<(BatchId, String)> = self
                .issued
                .iter()
                .filter(|(id, _)| !self.hidden.contains(id))
                .map(|(id, command)| (*id, command.clone()))
                .collect();
            for (id, command) in runnable {
                let status = worker(&command);
                self.issued.remove(&id);
                self.wall_times.remove(&id);
                updated.insert(id, status);
            }
        }

        updated
    }

    fn get_running_job_ids(&mut self) -> HashMap<BatchId, f64> {
        self.issued
            .keys()
            .filter(|id| !self.hidden.contains(id))
            .map(|id| (*id, self.wall_times.get(id).copied().unwrap_or(0.0)))
            .collect()
    }

    fn get_issued_job_ids(&self) -> HashSet<BatchId> {
        self.issued
            .keys()
            .filter(|id| !self.hidden.contains(id))
            .copied()
            .collect()
    }

    fn kill_jobs(&mut self, ids: &[BatchId]) -> Result<(), BatchError> {
        for id in ids {
            self.issued.remove(id);
            self.hidden.remove(id);
            self.wall_times.remove(id);
            self.killed.push(*id);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
