//! Counter replay: events drive the live app, every transition is logged,
//! and restore reconstructs the same state from the durable store alone.

mod fixtures;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use pine_host::{
    Evaluator, ExpressionTreeCompiler, LocalFileStore, PersistentProcess,
};

use fixtures::counter_app_tree;

fn open_process(root: &Path) -> PersistentProcess {
    let store = Box::new(LocalFileStore::open(root).expect("open store"));
    let (process, _cmds) = PersistentProcess::open(
        store,
        Arc::new(ExpressionTreeCompiler),
        Arc::new(Evaluator::new()),
    )
    .expect("open process");
    process
}

#[test]
fn counter_replay_across_restart() {
    let temp = TempDir::new().expect("temp dir");

    let process = open_process(temp.path());
    process
        .deploy_app_config_and_init_elm_app_state(&counter_app_tree())
        .expect("deploy");
    assert_eq!(process.state_json().unwrap(), "0");

    assert_eq!(process.process_elm_app_event("3").unwrap(), "3");
    assert_eq!(process.process_elm_app_event("-1").unwrap(), "2");
    assert_eq!(process.process_elm_app_event("10").unwrap(), "12");
    assert_eq!(process.state_json().unwrap(), "12");

    let status = process.status().unwrap();
    assert_eq!(status.composition_log_segment_count, 1);
    assert!(status.stored_component_count > 0);

    let head = process
        .last_composition_log_record_hash()
        .unwrap()
        .expect("head");
    process.dispose().expect("dispose");
    drop(process);

    let store = Box::new(LocalFileStore::open(temp.path()).expect("reopen store"));
    let (restored, cmds) = PersistentProcess::load_from_store(
        store,
        Arc::new(ExpressionTreeCompiler),
        Arc::new(Evaluator::new()),
    )
    .expect("load")
    .expect("process present");
    assert_eq!(restored.state_json().unwrap(), "12");
    assert_eq!(
        restored.last_composition_log_record_hash().unwrap(),
        Some(head)
    );
    // the deploy's init commands replay with the log
    assert!(cmds.is_some());
}

#[test]
fn truncate_then_restart_preserves_state() {
    let temp = TempDir::new().expect("temp dir");

    let process = open_process(temp.path());
    process
        .deploy_app_config_and_init_elm_app_state(&counter_app_tree())
        .expect("deploy");
    for event in ["3", "-1", "10"] {
        process.process_elm_app_event(event).unwrap();
    }

    let report = process
        .truncate_process_history(Duration::from_secs(10))
        .expect("truncate");
    assert!(report.completed);
    assert!(report.deleted_files > 0);
    drop(process);

    let restored = open_process(temp.path());
    assert_eq!(restored.state_json().unwrap(), "12");
    // the fresh reduction bounds replay to the head record alone
    assert_eq!(restored.status().unwrap().records_replayed, 1);

    // the process keeps working after compaction
    assert_eq!(restored.process_elm_app_event("1").unwrap(), "13");
}

#[test]
fn snapshot_bounds_restore_replay() {
    let temp = TempDir::new().expect("temp dir");

    let process = open_process(temp.path());
    process
        .deploy_app_config_and_init_elm_app_state(&counter_app_tree())
        .expect("deploy");
    process.process_elm_app_event("5").unwrap();
    process
        .store_reduction_record_for_current_state()
        .expect("snapshot");
    process.process_elm_app_event("2").unwrap();
    drop(process);

    let restored = open_process(temp.path());
    assert_eq!(restored.state_json().unwrap(), "7");
    // replay starts at the snapshot: the snapshotted record plus one event
    assert_eq!(restored.status().unwrap().records_replayed, 2);
}

#[test]
fn load_from_store_on_empty_store_is_none() {
    let temp = TempDir::new().expect("temp dir");
    let store = Box::new(LocalFileStore::open(temp.path()).expect("open store"));
    let loaded = PersistentProcess::load_from_store(
        store,
        Arc::new(ExpressionTreeCompiler),
        Arc::new(Evaluator::new()),
    )
    .expect("load");
    assert!(loaded.is_none());
}

#[test]
fn runtime_events_require_a_deployed_app() {
    let temp = TempDir::new().expect("temp dir");
    let process = open_process(temp.path());
    let err = process.process_elm_app_event("1").unwrap_err();
    assert!(matches!(
        err,
        pine_host::ProcessError::NoLiveProcess
    ));
}
