//! MongoDB destination driver
//!
//! Stores sample records as documents and carries the administrative
//! commands the provisioner needs: user creation, collection creation and a
//! collection-scoped read/write role.
//!
//! # Example
//!
//! ```ignore
//! use qdigest_core::{DatabaseDriver, DocumentStore, Endpoint};
//! use qdigest_driver_mongodb::MongoDbDriver;
//!
//! let driver = MongoDbDriver::new(Endpoint::tcp("localhost", 27017));
//! let store = driver.connect().await?;
//! let databases = store.list_databases().await?;
//! ```

pub mod commands;
#[cfg(test)]
mod commands_tests;
mod driver;
#[cfg(test)]
mod driver_tests;

pub use driver::*;
