//! qdigest Connection - Connection supervision
//!
//! Opens sessions through a `DatabaseDriver` with bounded, cancellable retry,
//! reports a fresh `HealthStatus` for each check, and guards sessions so
//! each one is closed exactly once.

mod guard;
pub mod health;
pub mod reconnect;

pub use guard::SessionGuard;
pub use health::{
    Connectivity, HealthCheckConfig, HealthChecker, HealthStatus, PingError, PingResult,
    SocketState, check_socket, ping_session,
};
pub use reconnect::{
    BackoffStrategy, ConnectionSupervisor, ReconnectConfig, Supervised, SupervisorState,
};
