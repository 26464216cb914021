// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup recovery.
//!
//! Runs once, before the main loop, over the whole job-file directory. After
//! it returns, the directory holds exactly one valid record per live job and
//! every in-flight job is re-runnable:
//!
//! 1. Abort checkpoints that never reached their linearisation point: the
//!    `.updating` manifest names the `.new` files to sweep; the base records
//!    are the valid state.
//! 2. Commit checkpoints that did reach it: orphan `.new` files are renamed
//!    over their base paths.
//! 3. Reset in-flight jobs: restore the retry budget and turn red and grey
//!    records white. Grey means "believed running in the batch system",
//!    which is never true after a master restart.

use grove_core::{Colour, MasterConfig};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointError, CheckpointIo, CheckpointWriter, NEW_SUFFIX, UPDATING_SUFFIX};
use crate::store::{read_record, JobStore, StoreError};

/// Errors from the recovery pass
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What recovery found and did.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Surviving job record paths, sorted.
    pub job_files: Vec<PathBuf>,
    /// Checkpoints rolled back via their manifest.
    pub aborted: usize,
    /// Orphan `.new` files rolled forward.
    pub committed: usize,
    /// Records reset from red or grey to white.
    pub reset: usize,
}

/// Repair the job-file directory and reset in-flight jobs.
pub fn recover<I: CheckpointIo>(
    store: &JobStore,
    writer: &CheckpointWriter<I>,
    config: &MasterConfig,
) -> Result<RecoveryReport, RecoveryError> {
    let mut files: BTreeSet<PathBuf> = store.list_job_files()?.into_iter().collect();
    let mut report = RecoveryReport::default();

    // Phase 1: abort in-progress checkpoints
    let manifests: Vec<PathBuf> = files
        .iter()
        .filter(|p| p.to_string_lossy().contains(UPDATING_SUFFIX))
        .cloned()
        .collect();
    for manifest in manifests {
        let listing = std::fs::read_to_string(&manifest)?;
        for listed in listing.split_whitespace() {
            let listed = PathBuf::from(listed);
            if listed.is_file() {
                store.destroy_job_file(&listed)?;
            }
            files.remove(&listed);
        }
        warn!(manifest = %manifest.display(), "aborting interrupted checkpoint");
        store.destroy_job_file(&manifest)?;
        files.remove(&manifest);
        report.aborted += 1;
    }

    // Phase 2: commit completed checkpoints
    let orphans: Vec<PathBuf> = files
        .iter()
        .filter(|p| p.to_string_lossy().ends_with(NEW_SUFFIX))
        .cloned()
        .collect();
    for orphan in orphans {
        let base = strip_new_suffix(&orphan);
        error!(
            from = %orphan.display(),
            to = %base.display(),
            "committing interrupted checkpoint"
        );
        std::fs::rename(&orphan, &base)?;
        files.remove(&orphan);
        files.insert(base);
        report.committed += 1;
    }

    // Phase 3: reset in-flight jobs
    let survivors: Vec<PathBuf> = files.iter().cloned().collect();
    for path in survivors {
        // A zero-length record is a stillborn child: its birth checkpoint
        // was rolled back in phase 1, so the parent still lists it as
        // unborn. Drop the allocated file.
        if std::fs::metadata(&path)?.len() == 0 {
            warn!(job = %path.display(), "dropping stillborn job record");
            store.destroy_job_file(&path)?;
            files.remove(&path);
            continue;
        }

        let mut job = read_record(&path)?;
        info!(job = %path.display(), colour = %job.colour, "restarting job");
        job.remaining_retry_count = config.retry_count;
        if matches!(job.colour, Colour::Red | Colour::Grey) {
            job.colour = Colour::White;
            report.reset += 1;
        }
        writer.commit(&[&job])?;
    }

    report.job_files = files.into_iter().collect();
    Ok(report)
}

fn strip_new_suffix(path: &Path) -> PathBuf {
    let name = path.to_string_lossy();
    PathBuf::from(name.trim_end_matches(NEW_SUFFIX))
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
