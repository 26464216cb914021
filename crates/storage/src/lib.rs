// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for grove: job records on disk, the atomic multi-file
//! checkpoint protocol, and startup recovery.

mod checkpoint;
mod recovery;
mod store;
mod tempdir;

pub use checkpoint::{
    new_path, updating_path, CheckpointError, CheckpointIo, CheckpointWriter, FsCheckpointIo,
    NEW_SUFFIX, UPDATING_SUFFIX,
};
pub use recovery::{recover, RecoveryError, RecoveryReport};
pub use store::{encode_record, read_record, JobStore, StoreError};
pub use tempdir::TempFileTree;
