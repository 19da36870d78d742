//! Health check functionality for sessions
//!
//! A `HealthStatus` is built from scratch on every check: ping result,
//! port, and the state of the driver's liveness artifact.
//!
//! # Example
//!
//! ```ignore
//! use qdigest_connection::health::HealthChecker;
//!
//! let checker = HealthChecker::with_defaults();
//! let status = checker.check(driver.endpoint(), &*session, driver.liveness_artifact()).await;
//! println!("{:?}: {:?}", status.connectivity, status.errors);
//! ```

mod checker;
mod ping;
mod status;


pub use checker::{HealthCheckConfig, HealthChecker};
pub use ping::{PingError, PingResult, check_socket, ping_session};
pub use status::{Connectivity, HealthStatus, SocketState};
