//! Health checker producing one fresh status per check

use std::path::Path;
use std::time::Duration;

use super::ping::{check_socket, ping_session};
use super::status::HealthStatus;
use qdigest_core::{Endpoint, Session};

/// Configuration for health checking
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Timeout for each ping operation
    pub ping_timeout: Duration,
}

impl HealthCheckConfig {
    /// Set ping timeout.
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(5),
        }
    }
}

/// Health checker for sessions
#[derive(Debug, Clone, Default)]
pub struct HealthChecker {
    config: HealthCheckConfig,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self { config }
    }

    /// Create a health checker with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(HealthCheckConfig::default())
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Ping the session and inspect the liveness artifact.
    pub async fn check<S>(
        &self,
        endpoint: &Endpoint,
        session: &S,
        artifact: Option<&Path>,
    ) -> HealthStatus
    where
        S: Session + ?Sized,
    {
        let socket = check_socket(artifact);
        match ping_session(session, self.config.ping_timeout).await {
            Ok(latency) => {
                let status = HealthStatus::open(endpoint, latency, socket);
                if status.is_degraded() {
                    tracing::warn!(
                        endpoint = %endpoint,
                        socket = ?status.socket,
                        "connected, but the control socket was not found"
                    );
                }
                status
            }
            Err(e) => HealthStatus::closed(endpoint, e.to_string(), socket),
        }
    }
}
