//! qdigest Core - Core abstractions shared by every qdigest crate
//!
//! This crate defines:
//!
//! - `DatabaseDriver` - Trait for driver implementations bound to one `Endpoint`
//! - `Session`, `Connection`, `DocumentStore` - Traits for live sessions
//! - `PlanRecord` / `SampleRecord` - The records written to the document store
//! - `DigestConfig` / `Settings` - Typed configuration
//! - The error taxonomy and common types like `Value`, `Row`, `QueryResult`

pub mod config;
mod connection;
mod driver;
mod error;
mod record;
mod types;

pub use config::{DigestConfig, Iterations, Settings};
pub use connection::*;
pub use driver::*;
pub use error::*;
pub use record::*;
pub use types::*;
