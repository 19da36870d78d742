//! Unit tests for administrative command builders

use crate::commands::*;
use bson::{Bson, doc};
use pretty_assertions::assert_eq;
use qdigest_core::Principal;

#[test]
fn test_already_exists_codes() {
    assert!(is_already_exists_code(48));
    assert!(is_already_exists_code(51002));
    assert!(is_already_exists_code(51003));
    assert!(!is_already_exists_code(13));
    assert!(!is_already_exists_code(11000));
}

#[test]
fn test_role_name() {
    assert_eq!(role_name("Queries"), "QueriesReadWrite");
}

#[test]
fn test_create_user_command() {
    let cmd = create_user_command(&Principal::new("harvester", "hunter2"));
    assert_eq!(
        cmd,
        doc! { "createUser": "harvester", "pwd": "hunter2", "roles": [] }
    );
}

#[test]
fn test_create_role_command_is_collection_scoped() {
    let cmd = create_role_command("QueryDigest", "Queries");
    assert_eq!(cmd.get_str("createRole").unwrap(), "QueriesReadWrite");

    let privileges = cmd.get_array("privileges").unwrap();
    assert_eq!(privileges.len(), 1);
    let Some(Bson::Document(privilege)) = privileges.first() else {
        panic!("privilege should be a document");
    };
    assert_eq!(
        privilege.get_document("resource").unwrap(),
        &doc! { "db": "QueryDigest", "collection": "Queries" }
    );
    let actions: Vec<&str> = privilege
        .get_array("actions")
        .unwrap()
        .iter()
        .filter_map(Bson::as_str)
        .collect();
    assert_eq!(actions, vec!["find", "insert", "update", "remove"]);
}

#[test]
fn test_grant_role_command() {
    let cmd = grant_role_command("QueryDigest", "Queries", &Principal::new("harvester", "x"));
    assert_eq!(
        cmd,
        doc! {
            "grantRolesToUser": "harvester",
            "roles": [ { "role": "QueriesReadWrite", "db": "QueryDigest" } ],
        }
    );
}

#[test]
fn test_ping_command() {
    assert_eq!(ping_command(), doc! { "ping": 1 });
}
