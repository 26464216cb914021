//! Duplicate and stray completion reports from the backend.

use crate::prelude::*;
use grove_adapters::FakeBatch;
use grove_core::BatchId;

#[test]
fn stray_completion_for_an_unknown_id_is_dropped() {
    let mut batch = FakeBatch::with_worker(|command| {
        finish_ok(&job_path(command), vec![]);
        0
    });
    // Reported before anything was ever issued: must be logged and dropped
    batch.push_completion(BatchId(777), 1);
    batch.push_completion(BatchId(778), 0);

    let mut h = harness(batch, |_| {});
    h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let residual = h.master.run().unwrap();
    assert_eq!(residual, 0);
}
