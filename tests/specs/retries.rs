//! Failure, retry exhaustion, and the residual a failed subtree leaves.

use crate::prelude::*;
use grove_adapters::FakeBatch;
use grove_core::Colour;
use grove_storage::read_record;

#[test]
fn failing_job_is_retried_exactly_retry_count_times() {
    // retry_count = 2 means three attempts in total
    let batch = FakeBatch::with_worker(|_| 1);
    let mut h = harness(batch, |_| {});
    let root = h.master.bootstrap(TaskSpec::new("doomed")).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 1);
    assert_eq!(h.master.batch().issue_log().len(), 3);
    let record = read_record(&root).unwrap();
    assert_eq!(record.colour, Colour::Red);
    assert_eq!(record.remaining_retry_count, 0);
}

#[test]
fn failed_child_strands_its_blue_parent_in_the_residual() {
    let batch = FakeBatch::with_worker(|command| {
        let path = job_path(command);
        let executed = executed_command(&path);
        if executed == "doomed-child" {
            // Worker dies without touching its record
            return 1;
        }
        let children = if executed == "root" {
            vec![TaskSpec::new("doomed-child")]
        } else {
            vec![]
        };
        finish_ok(&path, children);
        0
    });
    let mut h = harness(batch, |_| {});
    let root = h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let residual = h.master.run().unwrap();

    // The red leaf and the blue ancestor it stranded
    assert_eq!(residual, 2);
    // Root once, child three times
    assert_eq!(h.master.batch().issue_log().len(), 4);

    let root_record = read_record(&root).unwrap();
    assert_eq!(root_record.colour, Colour::Blue);
    assert_eq!(root_record.black_child_count, 0);

    let files = h.master.store().list_job_files().unwrap();
    assert_eq!(files.len(), 2);
    let child_file = files.iter().find(|f| **f != root).unwrap();
    let child_record = read_record(child_file).unwrap();
    assert_eq!(child_record.colour, Colour::Red);
    assert_eq!(child_record.remaining_retry_count, 0);
}

#[test]
fn flaky_job_that_recovers_still_completes_the_tree() {
    let mut failures_left = 2;
    let batch = FakeBatch::with_worker(move |command| {
        let path = job_path(command);
        if executed_command(&path) == "flaky" && failures_left > 0 {
            failures_left -= 1;
            return 1;
        }
        finish_ok(&path, vec![]);
        0
    });
    let mut h = harness(batch, |_| {});
    h.master.bootstrap(TaskSpec::new("flaky")).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    // Two failures then the successful third attempt
    assert_eq!(h.master.batch().issue_log().len(), 3);
}
