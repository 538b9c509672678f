//! Admin API dispatch: state endpoints, apply-function-on-db, and the
//! status-code mapping the external transport relies on.

mod fixtures;

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use pine_host::api::{AdminError, AdminInterface, ApplyFunctionOnDatabaseRequest};
use pine_host::{
    Evaluator, ExpressionTreeCompiler, LocalFileStore, PersistentProcess,
};

use fixtures::counter_app_tree;

fn admin(root: &Path) -> AdminInterface {
    let store = Box::new(LocalFileStore::open(root).expect("open store"));
    let (process, _cmds) = PersistentProcess::open(
        store,
        Arc::new(ExpressionTreeCompiler),
        Arc::new(Evaluator::new()),
    )
    .expect("open process");
    AdminInterface::new(Arc::new(process))
}

#[test]
fn get_and_set_elm_app_state() {
    let temp = TempDir::new().expect("temp dir");
    let admin = admin(temp.path());

    admin
        .deploy_and_init_app_state(&counter_app_tree())
        .expect("deploy");
    assert_eq!(admin.get_elm_app_state().unwrap(), "0");

    admin.set_elm_app_state("41").expect("set state");
    assert_eq!(admin.get_elm_app_state().unwrap(), "41");

    // the replacement is a logged composition event
    let admin = admin_reopen(temp.path(), admin);
    assert_eq!(admin.get_elm_app_state().unwrap(), "41");
}

fn admin_reopen(root: &Path, old: AdminInterface) -> AdminInterface {
    drop(old);
    admin(root)
}

#[test]
fn get_state_without_app_is_not_found() {
    let temp = TempDir::new().expect("temp dir");
    let admin = admin(temp.path());
    let err = admin.get_elm_app_state().unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn set_state_with_invalid_json_is_bad_request() {
    let temp = TempDir::new().expect("temp dir");
    let admin = admin(temp.path());
    admin
        .deploy_and_init_app_state(&counter_app_tree())
        .expect("deploy");

    let err = admin.set_elm_app_state("{not json").unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(admin.get_elm_app_state().unwrap(), "0");
}

#[test]
fn deploy_of_junk_tree_is_bad_request() {
    let temp = TempDir::new().expect("temp dir");
    let admin = admin(temp.path());

    let junk = pine_host::TreeNode::tree(vec![(
        "init.pine",
        pine_host::TreeNode::blob(b"not a function".as_ref()),
    )]);
    let err = admin.deploy_and_init_app_state(&junk).unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[test]
fn apply_function_commit_and_response() {
    let temp = TempDir::new().expect("temp dir");
    let admin = admin(temp.path());
    admin
        .deploy_and_init_app_state(&counter_app_tree())
        .expect("deploy");

    let peek = admin
        .apply_function_on_database(&ApplyFunctionOnDatabaseRequest {
            function_name: "add".into(),
            serialized_arguments_json: vec!["5".into()],
            commit_resulting_state: false,
        })
        .expect("apply without commit");
    assert_eq!(peek.function_application_result.response_json, "5");
    assert!(!peek.committed);
    assert_eq!(admin.get_elm_app_state().unwrap(), "0");

    let committed = admin
        .apply_function_on_database(&ApplyFunctionOnDatabaseRequest {
            function_name: "add".into(),
            serialized_arguments_json: vec!["5".into()],
            commit_resulting_state: true,
        })
        .expect("apply with commit");
    assert!(committed.committed);
    assert_eq!(admin.get_elm_app_state().unwrap(), "5");

    // only the committed application survives a restart
    let admin = admin_reopen(temp.path(), admin);
    assert_eq!(admin.get_elm_app_state().unwrap(), "5");
}

#[test]
fn apply_function_error_mapping() {
    let temp = TempDir::new().expect("temp dir");
    let admin = admin(temp.path());
    admin
        .deploy_and_init_app_state(&counter_app_tree())
        .expect("deploy");

    let unknown = admin
        .apply_function_on_database(&ApplyFunctionOnDatabaseRequest {
            function_name: "missing".into(),
            serialized_arguments_json: Vec::new(),
            commit_resulting_state: false,
        })
        .unwrap_err();
    assert_eq!(unknown.status_code(), 400);

    // `broken` violates the [state, response] return convention at runtime
    let broken = admin
        .apply_function_on_database(&ApplyFunctionOnDatabaseRequest {
            function_name: "broken".into(),
            serialized_arguments_json: Vec::new(),
            commit_resulting_state: false,
        })
        .unwrap_err();
    assert_eq!(broken.status_code(), 422);
    assert!(matches!(broken, AdminError::RuntimeException { .. }));
}

#[test]
fn revert_with_malformed_hash_is_bad_request() {
    let temp = TempDir::new().expect("temp dir");
    let admin = admin(temp.path());
    let err = admin.revert_process_to("zz").unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[test]
fn truncate_reports_progress() {
    let temp = TempDir::new().expect("temp dir");
    let admin = admin(temp.path());
    admin
        .deploy_and_init_app_state(&counter_app_tree())
        .expect("deploy");
    admin.set_elm_app_state("7").expect("set state");

    let report = admin
        .truncate_process_history(std::time::Duration::from_secs(10))
        .expect("truncate");
    assert!(report.completed);
    assert_eq!(admin.get_elm_app_state().unwrap(), "7");
}
