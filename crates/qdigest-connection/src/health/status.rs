//! Health status of one session check

use qdigest_core::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Whether the session answered its ping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Open,
    Closed,
}

/// State of the driver's local liveness artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    /// The driver has no artifact to check
    NotConfigured,
    Found(PathBuf),
    Missing { path: PathBuf, reason: String },
}

/// Result of one health check
///
/// `errors` is non-empty exactly when `connectivity` is `Closed`. A missing
/// socket artifact degrades an open status without adding an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub connectivity: Connectivity,
    pub endpoint: String,
    pub port: u16,
    pub socket: SocketState,
    pub errors: Vec<String>,
    /// Ping round-trip time, when the ping succeeded
    pub latency: Option<Duration>,
}

impl HealthStatus {
    /// Status of a session that answered its ping
    pub fn open(endpoint: &Endpoint, latency: Duration, socket: SocketState) -> Self {
        Self {
            connectivity: Connectivity::Open,
            endpoint: endpoint.to_string(),
            port: endpoint.port(),
            socket,
            errors: Vec::new(),
            latency: Some(latency),
        }
    }

    /// Status of a session that could not be opened or pinged
    pub fn closed(endpoint: &Endpoint, error: impl Into<String>, socket: SocketState) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "connection closed".to_string();
        }
        Self {
            connectivity: Connectivity::Closed,
            endpoint: endpoint.to_string(),
            port: endpoint.port(),
            socket,
            errors: vec![error],
            latency: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.connectivity == Connectivity::Open
    }

    /// Open, but the liveness artifact is missing
    pub fn is_degraded(&self) -> bool {
        self.is_open() && matches!(self.socket, SocketState::Missing { .. })
    }
}
