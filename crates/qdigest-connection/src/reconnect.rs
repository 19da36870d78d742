//! Bounded-retry connection supervision
//!
//! `ConnectionSupervisor` opens a session through a driver, pings it, and on
//! failure waits out a backoff before trying again. The wait is cancellable.
//!
//! # Example
//!
//! ```ignore
//! use qdigest_connection::reconnect::{BackoffStrategy, ConnectionSupervisor, ReconnectConfig};
//!
//! let config = ReconnectConfig::new(10, BackoffStrategy::fixed(15_000));
//! let supervisor = ConnectionSupervisor::new(driver, config);
//! let supervised = supervisor.connect(&cancel).await?;
//! supervised.session.ping().await?;
//! ```

mod backoff;
mod supervisor;


pub use backoff::BackoffStrategy;
pub use supervisor::{ConnectionSupervisor, ReconnectConfig, Supervised, SupervisorState};
