//! Trees: parents wait blue while their children run, then collapse upward.

use crate::prelude::*;
use grove_adapters::FakeBatch;

#[test]
fn root_with_two_children_drains_to_nothing() {
    let batch = FakeBatch::with_worker(|command| {
        let path = job_path(command);
        let executed = executed_command(&path);
        let children = if executed == "root" {
            vec![TaskSpec::new("child-a"), TaskSpec::new("child-b")]
        } else {
            vec![]
        };
        finish_ok(&path, children);
        0
    });
    let mut h = harness(batch, |_| {});
    h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    // Root plus both children were each issued exactly once
    let log = h.master.batch().issue_log();
    assert_eq!(log.len(), 3);
    assert!(h.master.store().list_job_files().unwrap().is_empty());
}

#[test]
fn grandchildren_are_driven_through_the_same_machine() {
    let batch = FakeBatch::with_worker(|command| {
        let path = job_path(command);
        let children = match executed_command(&path).as_str() {
            "root" => vec![TaskSpec::new("mid")],
            "mid" => vec![TaskSpec::new("leaf-1"), TaskSpec::new("leaf-2")],
            _ => vec![],
        };
        finish_ok(&path, children);
        0
    });
    let mut h = harness(batch, |_| {});
    h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    assert_eq!(h.master.batch().issue_log().len(), 4);
}

#[test]
fn wide_fanout_respects_the_issue_limit() {
    let batch = FakeBatch::with_worker(|command| {
        let path = job_path(command);
        let children = if executed_command(&path) == "root" {
            (0..10).map(|i| TaskSpec::new(format!("leaf-{i}"))).collect()
        } else {
            vec![]
        };
        finish_ok(&path, children);
        0
    });
    let mut h = harness(batch, |c| c.max_jobs = 2);
    h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    assert_eq!(h.master.batch().issue_log().len(), 11);
}
