// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic multi-record checkpointing.
//!
//! A checkpoint replaces the on-disk contents of a group of job records as
//! one unit. The protocol survives a crash at any instant:
//!
//! ```text
//! 1. write <first.file>.updating        manifest naming every .new sibling
//! 2. write <job.file>.new for each job  full replacement documents
//! 3. remove the .updating manifest      ← the linearisation point
//! 4. rename each .new over its base     swap in the new contents
//! ```
//!
//! A crash before step 3 leaves the manifest behind; recovery reads it,
//! deletes the listed `.new` files and the old contents stand. A crash after
//! step 3 leaves orphan `.new` files; recovery renames them into place. In
//! both cases the group is all-old or all-new, never mixed.
//!
//! ## Testability
//!
//! The [`CheckpointIo`] trait abstracts the raw file operations, enabling
//! deterministic unit tests with a recording fake and crash-scenario tests
//! that cut the protocol short at any step.

use grove_core::JobRecord;
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::store::{encode_record, StoreError};

/// Name fragment marking a checkpoint manifest.
pub const UPDATING_SUFFIX: &str = ".updating";

/// Name fragment marking a pending replacement document.
pub const NEW_SUFFIX: &str = ".new";

/// `<file>.updating` — the manifest path for a checkpoint led by `file`.
pub fn updating_path(file: &Path) -> PathBuf {
    append_suffix(file, UPDATING_SUFFIX)
}

/// `<file>.new` — the replacement path for `file`.
pub fn new_path(file: &Path) -> PathBuf {
    append_suffix(file, NEW_SUFFIX)
}

fn append_suffix(file: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(file.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Errors from checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] StoreError),
    #[error("checkpoint of nothing")]
    Empty,
    #[error("a checkpoint is already in progress at {0}")]
    ManifestExists(PathBuf),
    #[error("stale replacement file at {0}")]
    NewFileExists(PathBuf),
}

/// Raw file operations the protocol is written against.
///
/// The filesystem implementation is [`FsCheckpointIo`]; tests substitute a
/// recording fake with step injection.
pub trait CheckpointIo {
    /// Create `path` with the given contents and make it durable.
    fn write(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;

    /// Atomically rename `from` over `to`, replacing `to`.
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    fn remove(&self, path: &Path) -> std::io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Production I/O against the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCheckpointIo;

impl CheckpointIo for FsCheckpointIo {
    fn write(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Writes groups of job records through the checkpoint protocol.
#[derive(Debug, Clone, Default)]
pub struct CheckpointWriter<I: CheckpointIo = FsCheckpointIo> {
    io: I,
}

impl CheckpointWriter<FsCheckpointIo> {
    pub fn new() -> Self {
        Self::with_io(FsCheckpointIo)
    }
}

impl<I: CheckpointIo> CheckpointWriter<I> {
    /// Build a writer over a custom I/O layer (for testing).
    pub fn with_io(io: I) -> Self {
        Self { io }
    }

    /// Replace the on-disk contents of every record in `jobs`, atomically as
    /// a group.
    ///
    /// On return the documents are durable. If the process dies part-way,
    /// the next recovery pass restores either the old or the new contents of
    /// the whole group.
    pub fn commit(&self, jobs: &[&JobRecord]) -> Result<(), CheckpointError> {
        let first = jobs.first().ok_or(CheckpointError::Empty)?;

        let manifest = updating_path(&first.file);
        if self.io.exists(&manifest) {
            return Err(CheckpointError::ManifestExists(manifest));
        }

        let new_paths: Vec<PathBuf> = jobs.iter().map(|job| new_path(&job.file)).collect();
        for path in &new_paths {
            if self.io.exists(path) {
                return Err(CheckpointError::NewFileExists(path.clone()));
            }
        }

        // The manifest is the witness that an update is in progress; it
        // names every .new file to discard on abort.
        let listing = new_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        self.io.write(&manifest, listing.as_bytes())?;

        for (job, path) in jobs.iter().zip(&new_paths) {
            self.io.write(path, &encode_record(job)?)?;
        }

        // Linearisation point: once the manifest is gone, the .new files are
        // the valid state.
        self.io.remove(&manifest)?;

        for (job, path) in jobs.iter().zip(&new_paths) {
            self.io.rename(path, &job.file)?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
