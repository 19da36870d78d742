//! qdigest Admin - Destination store administration
//!
//! Provides first-run provisioning of the document store:
//! - the sample database and collection
//! - the service principal
//! - the principal's read/write grant on the collection

pub mod provision;

pub use provision::*;
