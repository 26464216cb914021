// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The master loop.
//!
//! Drives a tree of jobs to completion against a batch backend, surviving a
//! crash at any instant. The one rule everything else hangs off: a job is
//! checkpointed in its new colour *before* the corresponding external action.
//! On restart, recovery resets grey back to white, so a submission that
//! survived the crash is discarded and the job is simply re-issued —
//! re-execution instead of loss or double-accounting.

use grove_adapters::BatchSystem;
use grove_core::{BatchId, Clock, Colour, JobRecord, MasterConfig, TaskSpec};
use grove_storage::{new_path, recover, updating_path, CheckpointWriter, JobStore};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::dispatcher::Dispatcher;
use crate::error::{invariant, MasterError};
use crate::rescue::Rescue;

/// Interval between polls while pausing for a completion.
pub const PAUSE_SLEEP_FOR: Duration = Duration::from_millis(100);

/// Polls per pause before giving up and looping anyway.
pub const PAUSE_SLEEP_NUMBER: u32 = 100;

/// Wait between missing-job re-checks while misses are outstanding.
pub const MISSING_RETRY_SLEEP: Duration = Duration::from_secs(60);

/// Seconds shaved off the first rescue wait.
const FIRST_RESCUE_HEADSTART: f64 = 100.0;

/// One master process over one job-file directory.
pub struct Master<B: BatchSystem, C: Clock> {
    config: MasterConfig,
    store: JobStore,
    writer: CheckpointWriter,
    batch: B,
    clock: C,
    dispatcher: Dispatcher,
    rescue: Rescue,
    /// Record paths whose colour requires attention. Grey and blue jobs are
    /// never in here.
    updated: BTreeSet<PathBuf>,
    /// Record files on disk; the residual count at termination.
    total_job_files: usize,
}

impl<B: BatchSystem, C: Clock> Master<B, C> {
    pub fn new(config: MasterConfig, batch: B, clock: C) -> Result<Self, MasterError> {
        config.validate()?;
        let store = JobStore::open(&config)?;
        Ok(Self {
            config,
            store,
            writer: CheckpointWriter::new(),
            batch,
            clock,
            dispatcher: Dispatcher::new(),
            rescue: Rescue::new(),
            updated: BTreeSet::new(),
            total_job_files: 0,
        })
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn batch(&self) -> &B {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut B {
        &mut self.batch
    }

    /// Create and checkpoint the root job of a fresh tree.
    pub fn bootstrap(&mut self, spec: TaskSpec) -> Result<PathBuf, MasterError> {
        let job = self.store.create(spec, None, &self.config)?;
        self.writer.commit(&[&job])?;
        info!(job = %job.file.display(), "created root job");
        Ok(job.file)
    }

    /// Run recovery and the main loop to completion.
    ///
    /// Returns the number of record files left on disk: zero means the whole
    /// tree succeeded, anything else counts permanently failed jobs and the
    /// ancestors they stranded.
    pub fn run(&mut self) -> Result<usize, MasterError> {
        invariant!(
            self.batch.get_issued_job_ids().is_empty(),
            "batch system must start with no issued jobs"
        );

        let report = recover(&self.store, &self.writer, &self.config)?;
        info!(
            jobs = report.job_files.len(),
            aborted = report.aborted,
            committed = report.committed,
            reset = report.reset,
            "recovery complete"
        );

        self.total_job_files = report.job_files.len();
        self.updated.clear();
        for path in &report.job_files {
            let job = self.store.load(path)?;
            if job.colour.needs_attention() {
                self.updated.insert(path.clone());
            }
        }

        let stats_start = self.config.stats_enabled().then(|| self.clock.epoch());

        // Replicated quirk: the first rescue fires on its own early schedule
        // rather than a full period in.
        let mut last_rescued =
            self.clock.epoch() + self.config.rescue_jobs_frequency - FIRST_RESCUE_HEADSTART;

        info!(
            total = self.total_job_files,
            updated = self.updated.len(),
            "starting the main loop"
        );

        loop {
            self.process_updated()?;

            if self.dispatcher.is_empty() && self.updated.is_empty() {
                info!(
                    residual = self.total_job_files,
                    "no jobs issued and none to update, exiting"
                );
                break;
            }

            let completions = if self.updated.is_empty() {
                self.pause_for_updated()
            } else {
                self.batch.get_updated_jobs()
            };
            let mut completions: Vec<(BatchId, i32)> = completions.into_iter().collect();
            completions.sort_by_key(|(id, _)| *id);
            for (id, status) in completions {
                if self.dispatcher.contains(id) {
                    if status == 0 {
                        debug!(id = %id, "batch system reports success");
                    } else {
                        error!(id = %id, status, "batch system reports failure");
                    }
                    self.process_finished(id, status)?;
                } else {
                    // Duplicate reporting is tolerated
                    info!(id = %id, "completion for an already-processed job, dropping");
                }
            }

            if self.clock.epoch() - last_rescued >= self.config.rescue_jobs_frequency {
                self.rescue_over_long_jobs()?;
                self.rescue_missing_jobs()?;
                last_rescued = self.clock.epoch();
            }

            self.clock
                .sleep(Duration::from_secs_f64(self.config.wait_duration));
        }

        if let (Some(stats_path), Some(start)) = (self.config.stats.clone(), stats_start) {
            self.append_stats_footer(&stats_path, start)?;
        }

        info!("finished the main loop");
        Ok(self.total_job_files)
    }

    /// Step 1: drain the updated set, dispatching on colour.
    fn process_updated(&mut self) -> Result<(), MasterError> {
        let snapshot: Vec<PathBuf> = self.updated.iter().cloned().collect();
        for path in snapshot {
            let job = self.store.load(&path)?;
            invariant!(
                job.colour.needs_attention(),
                "job {} in the updated set is {}",
                path.display(),
                job.colour
            );
            match job.colour {
                Colour::White => self.start_job(job)?,
                Colour::Black => self.process_black(job)?,
                Colour::Red => self.process_red(job)?,
                Colour::Dead => self.collect_dead(job)?,
                // Excluded by the invariant above
                Colour::Grey | Colour::Blue => {}
            }
        }
        Ok(())
    }

    /// White: checkpoint to grey, then hand to the batch system.
    fn start_job(&mut self, mut job: JobRecord) -> Result<(), MasterError> {
        if self.dispatcher.len() >= self.config.max_jobs {
            debug!(
                job = %job.file.display(),
                issued = self.dispatcher.len(),
                "holding job, issue limit reached"
            );
            return Ok(());
        }

        debug!(job = %job.file.display(), "starting job");
        self.updated.remove(&job.file);

        // Fresh logs for this attempt
        std::fs::write(&job.log_file, b"")?;
        std::fs::write(&job.slave_log_file, b"")?;

        job.colour = Colour::Grey;
        self.writer.commit(&[&job])?;

        self.dispatcher
            .issue(&[&job], &mut self.batch, &self.config)
    }

    /// Black: aggregate stats, give birth to children, or chain the next
    /// follow-on, or die and credit the parent.
    fn process_black(&mut self, mut job: JobRecord) -> Result<(), MasterError> {
        debug!(job = %job.file.display(), "job finished okay");

        if let (Some(global), Some(per_job)) = (self.config.stats.clone(), job.stats.clone()) {
            append_file(&per_job, &global)?;
            std::fs::write(&per_job, b"")?;
        }

        invariant!(
            job.is_parent_complete(),
            "black job {} still has children in flight ({}/{})",
            job.file.display(),
            job.black_child_count,
            job.child_count
        );

        if job.has_unborn_children() {
            let specs = std::mem::take(&mut job.children);
            let mut children = Vec::with_capacity(specs.len());
            for spec in specs {
                let child = self.store.create(spec, Some(&job.file), &self.config)?;
                self.total_job_files += 1;
                self.updated.insert(child.file.clone());
                children.push(child);
            }
            debug!(
                job = %job.file.display(),
                children = children.len(),
                "giving birth to children"
            );

            job.child_count += children.len() as u32;
            job.colour = Colour::Blue;
            self.updated.remove(&job.file);

            let mut group: Vec<&JobRecord> = Vec::with_capacity(children.len() + 1);
            group.push(&job);
            group.extend(children.iter());
            self.writer.commit(&group).map_err(Into::into)
        } else if !job.follow_ons.is_empty() {
            debug!(job = %job.file.display(), "job has a further command to issue");
            job.remaining_retry_count = self.config.retry_count;
            job.colour = Colour::White;
            self.writer.commit(&[&job]).map_err(Into::into)
        } else {
            debug!(job = %job.file.display(), "job is now dead");
            job.colour = Colour::Dead;
            if let Some(parent_path) = job.parent.clone() {
                let mut parent = self.store.load(&parent_path)?;
                invariant!(
                    parent.colour == Colour::Blue,
                    "parent {} of finished job {} is {}",
                    parent_path.display(),
                    job.file.display(),
                    parent.colour
                );
                invariant!(
                    parent.black_child_count < parent.child_count,
                    "parent {} has no outstanding children to credit",
                    parent_path.display()
                );
                parent.black_child_count += 1;
                if parent.is_parent_complete() {
                    parent.colour = Colour::Black;
                    invariant!(
                        !self.updated.contains(&parent_path),
                        "blue parent {} was already in the updated set",
                        parent_path.display()
                    );
                    self.updated.insert(parent_path.clone());
                }
                self.writer.commit(&[&job, &parent]).map_err(Into::into)
            } else {
                self.writer.commit(&[&job]).map_err(Into::into)
            }
        }
    }

    /// Red: surface the logs, then retry or give up.
    fn process_red(&mut self, mut job: JobRecord) -> Result<(), MasterError> {
        error!(job = %job.file.display(), "job failed");
        log_file_at_error(&job.log_file, "task log of the failed job");
        log_file_at_error(&job.slave_log_file, "slave log of the failed job");

        invariant!(
            !job.has_unborn_children(),
            "failed job {} has unborn children",
            job.file.display()
        );
        invariant!(
            job.is_parent_complete(),
            "failed job {} has children in flight",
            job.file.display()
        );

        if job.remaining_retry_count > 0 {
            job.remaining_retry_count -= 1;
            job.colour = Colour::White;
            error!(
                job = %job.file.display(),
                retries_left = job.remaining_retry_count,
                "job will be restarted"
            );
            self.writer.commit(&[&job])?;
        } else {
            // Permanently failed: the record stays on disk so the failure is
            // visible and its subtree credit never propagates.
            self.updated.remove(&job.file);
            error!(job = %job.file.display(), "job is completely failed");
        }
        Ok(())
    }

    /// Dead: reclaim the record and its side files.
    fn collect_dead(&mut self, job: JobRecord) -> Result<(), MasterError> {
        debug!(job = %job.file.display(), "collecting dead job");
        self.updated.remove(&job.file);
        self.total_job_files -= 1;
        self.store.delete(&job)?;
        Ok(())
    }

    /// A batch completion for a live id: repair whatever state the worker
    /// left the record in, then queue it for attention.
    fn process_finished(&mut self, id: BatchId, status: i32) -> Result<(), MasterError> {
        let path = self.dispatcher.remove(id).ok_or_else(|| {
            MasterError::Invariant(format!("no live entry for batch id {id}"))
        })?;

        if status != 0 {
            self.repair_failed_record(&path)?;
        }

        // The logs must exist for the eventual record cleanup to find.
        let job = self.store.load(&path)?;
        for log in [&job.log_file, &job.slave_log_file] {
            if !log.is_file() {
                error!(
                    job = %path.display(),
                    log = %log.display(),
                    "log file had disappeared, recreating"
                );
                std::fs::write(log, b"")?;
            }
        }

        invariant!(
            self.updated.insert(path.clone()),
            "finished job {} was already in the updated set",
            path.display()
        );
        debug!(job = %path.display(), "job added to the updated set");
        Ok(())
    }

    /// Sort out the record of a job whose batch execution failed. The worker
    /// may have died at any point in its own checkpoint.
    fn repair_failed_record(&mut self, path: &Path) -> Result<(), MasterError> {
        let manifest = updating_path(path);
        let replacement = new_path(path);

        if manifest.is_file() {
            // The worker crashed mid-checkpoint: its manifest still stands,
            // so the original record is the valid state.
            error!(job = %path.display(), "crashed job left an in-progress checkpoint");
            if replacement.is_file() {
                std::fs::remove_file(&replacement)?;
            }
            std::fs::remove_file(&manifest)?;

            invariant!(
                path.is_file(),
                "job record {} vanished with its checkpoint",
                path.display()
            );
            let mut job = self.store.load(path)?;
            invariant!(
                !job.has_unborn_children(),
                "pre-checkpoint record {} already lists children",
                path.display()
            );
            invariant!(
                job.is_parent_complete(),
                "pre-checkpoint record {} has children in flight",
                path.display()
            );
            job.colour = Colour::Red;
            self.writer.commit(&[&job])?;
            error!(job = %path.display(), "reverted to the original record and marked it failed");
        } else if replacement.is_file() {
            // The worker wrote its full replacement and died before (or
            // while) the batch system noticed: commit it.
            error!(job = %path.display(), "crashed job left a complete replacement record");
            std::fs::rename(&replacement, path)?;
            let job = self.store.load(path)?;
            invariant!(
                matches!(job.colour, Colour::Black | Colour::Red),
                "replacement record {} is {}",
                path.display(),
                job.colour
            );
        } else {
            invariant!(
                path.is_file(),
                "job record {} vanished",
                path.display()
            );
            let mut job = self.store.load(path)?;
            if job.colour == Colour::Black {
                // Worker died after reporting success; keep the result.
                error!(
                    job = %path.display(),
                    "job completed okay despite the batch system failure"
                );
            } else {
                invariant!(
                    matches!(job.colour, Colour::Grey | Colour::Red),
                    "failed job {} is unexpectedly {}",
                    path.display(),
                    job.colour
                );
                invariant!(
                    !job.has_unborn_children(),
                    "failed job {} lists unborn children",
                    path.display()
                );
                invariant!(
                    job.is_parent_complete(),
                    "failed job {} has children in flight",
                    path.display()
                );
                if job.colour == Colour::Grey {
                    job.colour = Colour::Red;
                    self.writer.commit(&[&job])?;
                }
                error!(job = %path.display(), "marked the failed job red");
            }
        }
        Ok(())
    }

    /// Poll for completions, sleeping between attempts, until one arrives or
    /// the pause budget runs out.
    fn pause_for_updated(&mut self) -> HashMap<BatchId, i32> {
        for _ in 0..PAUSE_SLEEP_NUMBER {
            let updated = self.batch.get_updated_jobs();
            if !updated.is_empty() {
                return updated;
            }
            self.clock.sleep(PAUSE_SLEEP_FOR);
        }
        self.batch.get_updated_jobs()
    }

    /// Kill jobs that have run past `max_job_duration` and fail them.
    fn rescue_over_long_jobs(&mut self) -> Result<(), MasterError> {
        if self.config.max_job_duration_disabled() {
            return Ok(());
        }

        let mut running: Vec<(BatchId, f64)> =
            self.batch.get_running_job_ids().into_iter().collect();
        running.sort_by_key(|(id, _)| *id);

        for (id, wall) in running {
            if wall > self.config.max_job_duration {
                let path = self
                    .dispatcher
                    .path_for(id)
                    .map(Path::to_owned)
                    .ok_or_else(|| {
                        MasterError::Invariant(format!("running batch id {id} is not live"))
                    })?;
                error!(
                    job = %path.display(),
                    id = %id,
                    wall_seconds = wall,
                    limit = self.config.max_job_duration,
                    "job ran over the duration limit, killing it"
                );
                self.batch.kill_jobs(&[id])?;
                self.process_finished(id, 1)?;
            }
        }
        Ok(())
    }

    /// Kill jobs the backend has lost track of, with hysteresis, re-checking
    /// until no misses are outstanding.
    fn rescue_missing_jobs(&mut self) -> Result<(), MasterError> {
        loop {
            let issued = self.batch.get_issued_job_ids();
            let live = self.dispatcher.ids();
            invariant!(
                issued.is_subset(&live),
                "batch system reported ids the master never issued"
            );

            let report = self.rescue.observe(&live, &issued);

            for (id, times) in &report.still_missing {
                let job = self
                    .dispatcher
                    .path_for(*id)
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                error!(job = %job, id = %id, times, "job is missing from the batch system");
            }

            for id in report.to_kill {
                let path = self
                    .dispatcher
                    .path_for(id)
                    .map(Path::to_owned)
                    .ok_or_else(|| {
                        MasterError::Invariant(format!("missing batch id {id} is not live"))
                    })?;
                error!(
                    job = %path.display(),
                    id = %id,
                    "job missing too many times, killing it"
                );
                self.batch.kill_jobs(&[id])?;
                self.process_finished(id, 1)?;
            }

            if report.still_missing.is_empty() {
                return Ok(());
            }
            error!(
                outstanding = report.still_missing.len(),
                "sleeping before re-checking missing jobs"
            );
            self.clock.sleep(MISSING_RETRY_SLEEP);
        }
    }

    fn append_stats_footer(&self, path: &Path, start: f64) -> Result<(), MasterError> {
        let footer = serde_json::json!({
            "event": "run_complete",
            "wall_seconds": self.clock.epoch() - start,
            "residual_jobs": self.total_job_files,
        });
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{footer}")?;
        Ok(())
    }
}

/// Append the contents of `from` onto `to`.
fn append_file(from: &Path, to: &Path) -> std::io::Result<()> {
    let bytes = std::fs::read(from)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(to)?;
    file.write_all(&bytes)
}

/// Surface a log file into the master's own log at error level.
fn log_file_at_error(path: &Path, label: &str) {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => {
            error!(log = %path.display(), "{label}: empty");
        }
        Ok(text) => {
            error!(log = %path.display(), "{label}:\n{}", text.trim_end());
        }
        Err(e) => {
            error!(log = %path.display(), error = %e, "{label}: unreadable");
        }
    }
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
