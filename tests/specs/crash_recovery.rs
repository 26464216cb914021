//! Crash states constructed on disk, then a fresh master run over them.

use crate::prelude::*;
use grove_adapters::FakeBatch;
use grove_core::Colour;
use grove_storage::{encode_record, new_path, read_record, updating_path, CheckpointWriter};

fn succeeding_batch() -> FakeBatch {
    FakeBatch::with_worker(|command| {
        finish_ok(&job_path(command), vec![]);
        0
    })
}

#[test]
fn crash_before_manifest_removal_rolls_back_and_reruns() {
    // The master died after writing the manifest and the .new file but
    // before removing the manifest: the pre-checkpoint record must win.
    let mut h = harness(succeeding_batch(), |_| {});
    let root = h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let mut half_written = read_record(&root).unwrap();
    half_written.colour = Colour::Grey;
    let replacement = new_path(&root);
    std::fs::write(&replacement, encode_record(&half_written).unwrap()).unwrap();
    std::fs::write(
        updating_path(&root),
        replacement.to_string_lossy().as_bytes(),
    )
    .unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    assert!(h.master.store().list_job_files().unwrap().is_empty());
    // The white pre-checkpoint record was issued normally
    assert_eq!(h.master.batch().issue_log().len(), 1);
}

#[test]
fn crash_after_manifest_removal_rolls_forward() {
    // The master died between removing the manifest and renaming the .new
    // file: the replacement must be committed on restart.
    let mut h = harness(succeeding_batch(), |_| {});
    let root = h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let mut replacement = read_record(&root).unwrap();
    replacement.remaining_retry_count = 0;
    replacement.colour = Colour::Red;
    std::fs::write(&new_path(&root), encode_record(&replacement).unwrap()).unwrap();
    std::fs::remove_file(&root).unwrap();

    let residual = h.master.run().unwrap();

    // Rolled forward to red, then reset white with a fresh retry budget by
    // recovery, then run to completion.
    assert_eq!(residual, 0);
    assert_eq!(h.master.batch().issue_log().len(), 1);
}

#[test]
fn grey_record_is_reissued_after_a_master_restart() {
    // Crashed between the grey checkpoint and/or the submission: on restart
    // the job must simply run again.
    let mut h = harness(succeeding_batch(), |_| {});
    let root = h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let mut grey = read_record(&root).unwrap();
    grey.colour = Colour::Grey;
    CheckpointWriter::new().commit(&[&grey]).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    assert_eq!(h.master.batch().issue_log().len(), 1);
}

#[test]
fn red_records_get_a_fresh_retry_budget_on_restart() {
    // The whole tree is assumed to have been bounced: a red record with no
    // retries left runs again after restart.
    let mut h = harness(succeeding_batch(), |_| {});
    let root = h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let mut red = read_record(&root).unwrap();
    red.colour = Colour::Red;
    red.remaining_retry_count = 0;
    CheckpointWriter::new().commit(&[&red]).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
}

#[test]
fn blue_parent_resumes_waiting_after_restart() {
    // A mid-tree crash state: parent blue on disk, child white. On restart
    // only the child is issued; the parent collapses when the child dies.
    let mut h = harness(succeeding_batch(), |_| {});
    let root = h.master.bootstrap(TaskSpec::new("root")).unwrap();

    let writer = CheckpointWriter::new();
    let mut parent = read_record(&root).unwrap();
    parent.colour = Colour::Blue;
    parent.child_count = 1;
    parent.follow_ons.clear();

    let config = h.master.config().clone();
    let child = h
        .master
        .store()
        .create(TaskSpec::new("child"), Some(&root), &config)
        .unwrap();
    writer.commit(&[&parent, &child]).unwrap();

    let residual = h.master.run().unwrap();

    assert_eq!(residual, 0);
    // Only the child ever reached the batch system
    assert_eq!(h.master.batch().issue_log().len(), 1);
    assert!(h.master.batch().issue_log()[0].contains(&child.file.display().to_string()));
}
