//! A root with no children: issue, observe completion, collect.

use crate::prelude::*;
use grove_adapters::FakeBatch;
use grove_core::Colour;
use grove_storage::{read_record, CheckpointWriter};

#[test]
fn root_with_no_children_completes_and_leaves_nothing() {
    let batch = FakeBatch::with_worker(|command| {
        finish_ok(&job_path(command), vec![]);
        0
    });
    let mut h = harness(batch, |_| {});
    let root = h.master.bootstrap(TaskSpec::new("the-root-task")).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    assert!(!root.exists());
    assert_eq!(h.master.batch().issue_log().len(), 1);
    assert!(h.master.store().list_job_files().unwrap().is_empty());
}

#[test]
fn follow_on_chain_runs_in_the_same_record() {
    // The first body appends a second phase before finishing; the master
    // re-whitens the record and issues it again without a new record file.
    let batch = FakeBatch::with_worker(|command| {
        let path = job_path(command);
        let executed = executed_command(&path);
        if executed == "phase-one" {
            let mut job = read_record(&path).unwrap();
            job.follow_ons.pop();
            job.follow_ons.push(TaskSpec::new("phase-two"));
            job.colour = Colour::Black;
            CheckpointWriter::new().commit(&[&job]).unwrap();
        } else {
            finish_ok(&path, vec![]);
        }
        0
    });
    let mut h = harness(batch, |_| {});
    h.master.bootstrap(TaskSpec::new("phase-one")).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    // Two issues of the same record path
    let log = h.master.batch().issue_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], log[1]);
}

#[test]
fn stats_are_aggregated_and_footered() {
    let batch = FakeBatch::with_worker(|command| {
        let path = job_path(command);
        let job = read_record(&path).unwrap();
        // The worker drops its measurements into the per-job stats file
        std::fs::write(job.stats.as_ref().unwrap(), b"{\"cpu\":2.5}\n").unwrap();
        finish_ok(&path, vec![]);
        0
    });
    let mut h = harness(batch, |c| {
        c.stats = Some(c.log_file_dir.join("stats.jsonl"));
    });
    let stats_path = h.master.config().stats.clone().unwrap();
    h.master.bootstrap(TaskSpec::new("measured")).unwrap();

    assert_eq!(h.master.run().unwrap(), 0);

    let stats = std::fs::read_to_string(&stats_path).unwrap();
    assert!(stats.contains("{\"cpu\":2.5}"));
    assert!(stats.contains("run_complete"));
}
