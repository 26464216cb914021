//! Jobs the batch system loses track of.

use crate::prelude::*;
use grove_adapters::FakeBatch;
use grove_core::Colour;
use grove_engine::MISSING_RETRY_SLEEP;
use grove_storage::read_record;

#[test]
fn lost_job_is_killed_after_three_rescue_observations() {
    // The backend drops the submission on the floor: it never appears in
    // the issued listing and never completes.
    let mut batch = FakeBatch::new();
    batch.hide_on_issue("--job");
    let mut h = harness(batch, |c| {
        c.retry_count = 0;
        c.rescue_jobs_frequency = 10.0;
    });
    let root = h.master.bootstrap(TaskSpec::new("vanishing")).unwrap();

    let residual = h.master.run().unwrap();

    // Killed once, failed, no retries: the red record is the residual
    assert_eq!(residual, 1);
    assert_eq!(h.master.batch().killed().len(), 1);
    let record = read_record(&root).unwrap();
    assert_eq!(record.colour, Colour::Red);
    assert_eq!(record.remaining_retry_count, 0);

    // The hysteresis waited between consecutive observations
    let long_sleeps = h
        .clock
        .slept()
        .iter()
        .filter(|d| **d == MISSING_RETRY_SLEEP)
        .count();
    assert_eq!(long_sleeps, 2);
}

#[test]
fn lost_job_is_retried_when_retries_remain() {
    let mut batch = FakeBatch::new();
    batch.hide_on_issue("--job");
    let mut h = harness(batch, |c| {
        c.retry_count = 1;
        c.rescue_jobs_frequency = 10.0;
    });
    h.master.bootstrap(TaskSpec::new("vanishing")).unwrap();

    let residual = h.master.run().unwrap();

    // Both the first attempt and the retry were lost and killed
    assert_eq!(residual, 1);
    assert_eq!(h.master.batch().killed().len(), 2);
    assert_eq!(h.master.batch().issue_log().len(), 2);
}
