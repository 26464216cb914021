// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction.
//!
//! The master sleeps a lot — between loop iterations, while pausing for
//! batch updates, and while waiting out transient backend inconsistency.
//! Routing every time read and sleep through [`Clock`] keeps those waits out
//! of the test suite: [`FakeClock`] advances its own time instead of
//! blocking.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Monotonic now.
    fn now(&self) -> Instant;

    /// Seconds since the Unix epoch, as the wall clock the rescue cadence is
    /// measured against.
    fn epoch(&self) -> f64;

    /// Block for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug)]
struct FakeClockState {
    start: Instant,
    offset: Duration,
    epoch_base: f64,
    slept: Vec<Duration>,
}

/// Manually advanced clock for tests.
///
/// `sleep` records the request and advances time by the same amount, so loop
/// code that waits on the clock makes progress without blocking the test.
#[derive(Debug, Clone)]
pub struct FakeClock {
    state: Arc<Mutex<FakeClockState>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeClockState {
                start: Instant::now(),
                offset: Duration::ZERO,
                epoch_base: 1_000_000.0,
                slept: Vec::new(),
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.state.lock().offset += duration;
    }

    /// Durations passed to `sleep`, in order.
    pub fn slept(&self) -> Vec<Duration> {
        self.state.lock().slept.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.state.lock().slept.iter().sum()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        let state = self.state.lock();
        state.start + state.offset
    }

    fn epoch(&self) -> f64 {
        let state = self.state.lock();
        state.epoch_base + state.offset.as_secs_f64()
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.slept.push(duration);
        state.offset += duration;
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
