//! Administrative command documents and server error classification

use bson::{Bson, Document, doc};
use qdigest_core::{DriverError, Principal};

/// `NamespaceExists`, returned by `create` for an existing collection
pub const NAMESPACE_EXISTS: i32 = 48;
/// Returned by `createRole` for an existing role
pub const ROLE_ALREADY_EXISTS: i32 = 51002;
/// Returned by `createUser` for an existing user
pub const USER_ALREADY_EXISTS: i32 = 51003;

/// Actions granted on the sample collection
pub const READ_WRITE_ACTIONS: [&str; 4] = ["find", "insert", "update", "remove"];

/// Whether a server error code reports an object that is already present
pub fn is_already_exists_code(code: i32) -> bool {
    matches!(
        code,
        NAMESPACE_EXISTS | ROLE_ALREADY_EXISTS | USER_ALREADY_EXISTS
    )
}

/// Name of the collection-scoped read/write role
pub fn role_name(collection: &str) -> String {
    format!("{}ReadWrite", collection)
}

pub fn ping_command() -> Document {
    doc! { "ping": 1 }
}

/// `createUser` with no built-in roles; access comes from [`create_role_command`]
pub fn create_user_command(principal: &Principal) -> Document {
    doc! {
        "createUser": principal.username.as_str(),
        "pwd": principal.password.as_str(),
        "roles": Bson::Array(Vec::new()),
    }
}

pub fn create_role_command(database: &str, collection: &str) -> Document {
    let actions: Vec<Bson> = READ_WRITE_ACTIONS
        .iter()
        .map(|a| Bson::String(a.to_string()))
        .collect();
    doc! {
        "createRole": role_name(collection),
        "privileges": [
            {
                "resource": { "db": database, "collection": collection },
                "actions": actions,
            }
        ],
        "roles": Bson::Array(Vec::new()),
    }
}

pub fn grant_role_command(database: &str, collection: &str, principal: &Principal) -> Document {
    doc! {
        "grantRolesToUser": principal.username.as_str(),
        "roles": [ { "role": role_name(collection), "db": database } ],
    }
}

/// Map a driver error, turning "already exists" server codes into
/// [`DriverError::AlreadyExists`]
pub fn classify_error(err: mongodb::error::Error, context: &str) -> DriverError {
    if let mongodb::error::ErrorKind::Command(ref command_error) = *err.kind
        && is_already_exists_code(command_error.code)
    {
        return DriverError::AlreadyExists(format!("{}: {}", context, command_error.message));
    }
    DriverError::Driver(format!("{}: {}", context, err))
}
