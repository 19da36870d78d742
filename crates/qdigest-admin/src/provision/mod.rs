//! Schema provisioning module
//!
//! Ensures the destination store holds the database, collection, principal
//! and grant the pipeline writes through. Every step may be repeated.

mod service;


pub use service::*;
