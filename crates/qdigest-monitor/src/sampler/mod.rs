//! Plan sampling module
//!
//! Fires the monitored query on the application connection while the
//! administrative connection explains it and looks up its digest.

mod plan;
mod service;


pub use plan::*;
pub use service::*;
