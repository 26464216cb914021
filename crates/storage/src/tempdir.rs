// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unique file and directory allocation under a configured root.
//!
//! Every side path of a job — the record itself, its log files, its scratch
//! directory — is issued and reclaimed through one of these trees, so
//! deleting a job is a matter of handing each path back.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::store::StoreError;

/// Allocator of unique paths under one root directory.
///
/// Names are uuid-based and therefore never contain whitespace; the
/// checkpoint manifest format depends on that.
#[derive(Debug, Clone)]
pub struct TempFileTree {
    root: PathBuf,
}

impl TempFileTree {
    /// Open a tree rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh empty file with the given suffix.
    pub fn get_temp_file(&self, suffix: &str) -> Result<PathBuf, StoreError> {
        let path = self.root.join(format!("{}{}", Uuid::new_v4(), suffix));
        std::fs::File::create(&path)?;
        Ok(path)
    }

    /// Allocate a fresh empty directory.
    pub fn get_temp_dir(&self) -> Result<PathBuf, StoreError> {
        let path = self.root.join(Uuid::new_v4().to_string());
        std::fs::create_dir(&path)?;
        Ok(path)
    }

    /// Reclaim a file issued by this tree. Missing files are fine.
    pub fn destroy_file(&self, path: &Path) -> Result<(), StoreError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reclaim a directory and its contents. Missing directories are fine.
    pub fn destroy_dir(&self, path: &Path) -> Result<(), StoreError> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All files currently present directly under the root, sorted.
    pub fn list_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
#[path = "tempdir_tests.rs"]
mod tests;
