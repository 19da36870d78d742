//! Source instrumentation module
//!
//! Turns on the MySQL slow query log and related globals once, on the
//! administrative connection, before sampling starts.

mod setup;


pub use setup::*;
