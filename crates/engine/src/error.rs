// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the master

use grove_adapters::BatchError;
use grove_core::ConfigError;
use grove_storage::{CheckpointError, RecoveryError, StoreError};
use thiserror::Error;

/// Errors that abort the master.
///
/// `Invariant` is the fatal class of spec'd state-machine checks: the job
/// tree on disk contradicts what the transitions guarantee, and continuing
/// would corrupt it further. Everything else is an environment failure.
#[derive(Debug, Error)]
pub enum MasterError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("recovery error: {0}")]
    Recovery(#[from] RecoveryError),
    #[error("batch system error: {0}")]
    Batch(#[from] BatchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Bail out with [`MasterError::Invariant`] when a state-machine check fails.
macro_rules! invariant {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::MasterError::Invariant(format!($($arg)*)));
        }
    };
}

pub(crate) use invariant;
