// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task descriptors: the attribute bags workers hand back for children and
//! follow-ons.

use serde::{Deserialize, Serialize};

/// One unit of work to run, either as a fresh child job or as a follow-on of
/// an existing job.
///
/// Resource fields may be zero, meaning "use the configured defaults"; they
/// are resolved when a record is created from the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Shell command the worker will execute for this task.
    pub command: String,
    /// Memory requirement in bytes for the batch submission.
    #[serde(default)]
    pub memory: u64,
    /// CPU requirement for the batch submission.
    #[serde(default)]
    pub cpu: u32,
    /// Estimated wall time in seconds. Carried into the record as
    /// `total_time`; never aggregated.
    #[serde(default)]
    pub time: f64,
}

impl TaskSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            memory: 0,
            cpu: 0,
            time: 0.0,
        }
    }

    /// Fill zeroed resource fields from the given defaults.
    pub fn with_defaults(mut self, memory: u64, cpu: u32) -> Self {
        if self.memory == 0 {
            self.memory = memory;
        }
        if self.cpu == 0 {
            self.cpu = cpu;
        }
        self
    }
}
