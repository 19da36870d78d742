//! qdigest Monitor - Slow query instrumentation and plan sampling
//!
//! This crate provides the source-side half of the harvest pipeline:
//! - Enabling the slow query log and instrumentation globals
//! - Firing the monitored query and confirming its capture in `performance_schema`
//! - Scanning `EXPLAIN` output into plan records

pub mod instrumentation;
pub mod sampler;

#[cfg(test)]
mod mock;

pub use instrumentation::*;
pub use sampler::*;
