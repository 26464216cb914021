// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-job colour state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling state of a job record.
///
/// A job moves white → grey → black and back, spending time as blue while
/// children are in flight, detouring through red on failure, and ending dead
/// once nothing remains to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    /// Ready to run; no batch id exists.
    White,
    /// Issued to the batch system; awaiting completion.
    Grey,
    /// Has at least one child in flight.
    Blue,
    /// Body completed successfully; children/follow-ons not yet processed.
    Black,
    /// Last execution failed; awaiting the retry decision.
    Red,
    /// Terminal; record and side files are to be collected.
    Dead,
}

impl Colour {
    /// Whether the main loop owes this job attention.
    ///
    /// Grey and blue jobs are waiting on something external (the batch
    /// system, their children) and must not appear in the updated set.
    pub fn needs_attention(self) -> bool {
        !matches!(self, Colour::Grey | Colour::Blue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Colour::White => "white",
            Colour::Grey => "grey",
            Colour::Blue => "blue",
            Colour::Black => "black",
            Colour::Red => "red",
            Colour::Dead => "dead",
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "colour_tests.rs"]
mod tests;
