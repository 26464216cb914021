// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Batch-system adapters for grove

pub mod batch;

pub use batch::{BatchError, BatchJobSpec, BatchSystem, LocalBatch};

#[cfg(any(test, feature = "test-support"))]
pub use batch::fake::FakeBatch;
