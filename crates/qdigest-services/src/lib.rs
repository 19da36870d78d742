//! qdigest Services Layer
//!
//! This crate wires the harvest pipeline together and drives it.
//!
//! # Architecture
//!
//! ```text
//! CLI (qdigest-cli)
//!     ↓
//! Service Layer (qdigest-services) ← This crate
//!     ↓
//! Domain Layer (qdigest-connection, qdigest-admin, qdigest-monitor)
//!     ↓
//! Infrastructure Layer (qdigest-core, qdigest-drivers)
//! ```
//!
//! # Services
//!
//! - [`Pipeline`] - Startup in dependency order and shutdown of every session
//! - [`Orchestrator`] - The sequential sampling loop
//! - [`RecordWriter`] - One insert per sample
//!
//! Sampling and write failures are counted and logged per iteration; every
//! startup failure is fatal.

mod error;
mod orchestrator;
mod pipeline;
mod record_writer;

pub use error::{ServiceError, ServiceResult};
pub use orchestrator::{Clock, Orchestrator, PipelineContext, RunSummary, system_clock};
pub use pipeline::{
    DESTINATION_ADMIN, DESTINATION_APP, Pipeline, PipelineDrivers, RoleHealth, SOURCE_ADMIN,
    SOURCE_APP, reconnect_config,
};
pub use record_writer::RecordWriter;
