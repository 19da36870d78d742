//! Session ping and liveness artifact checks

use qdigest_core::Session;
use std::path::Path;
use std::time::{Duration, Instant};

use super::status::SocketState;

/// Result of a ping operation
pub type PingResult = Result<Duration, PingError>;

/// Error that can occur during a ping operation
#[derive(Debug, Clone, PartialEq)]
pub enum PingError {
    /// The session is closed
    ConnectionClosed,
    /// The server rejected or failed the ping
    Failed(String),
    /// Ping timed out
    Timeout,
}

impl std::fmt::Display for PingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PingError::ConnectionClosed => write!(f, "Connection is closed"),
            PingError::Failed(msg) => write!(f, "Ping failed: {}", msg),
            PingError::Timeout => write!(f, "Ping timed out"),
        }
    }
}

impl std::error::Error for PingError {}

/// Ping a session and return the round-trip time.
///
/// Uses the driver's protocol-level ping (`COM_PING` for MySQL, the `ping`
/// command for MongoDB).
pub async fn ping_session<S>(session: &S, timeout: Duration) -> PingResult
where
    S: Session + ?Sized,
{
    if session.is_closed() {
        return Err(PingError::ConnectionClosed);
    }

    let start = Instant::now();
    match tokio::time::timeout(timeout, session.ping()).await {
        Ok(Ok(())) => Ok(start.elapsed()),
        Ok(Err(e)) => Err(PingError::Failed(e.to_string())),
        Err(_) => Err(PingError::Timeout),
    }
}

/// Check whether a liveness artifact exists on the local filesystem
pub fn check_socket(path: Option<&Path>) -> SocketState {
    let Some(path) = path else {
        return SocketState::NotConfigured;
    };
    match std::fs::metadata(path) {
        Ok(_) => SocketState::Found(path.to_path_buf()),
        Err(e) => SocketState::Missing {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    }
}
