//! Connection supervisor: open, verify, retry

use std::sync::Arc;

use qdigest_core::{ConnectionError, DatabaseDriver, Session};
use tokio_util::sync::CancellationToken;

use super::BackoffStrategy;
use crate::health::{HealthChecker, HealthStatus};

/// Configuration for bounded retry
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Retries after the first attempt (0 = a single attempt)
    max_retries: u32,
    backoff: BackoffStrategy,
}

impl ReconnectConfig {
    pub fn new(max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }
}

impl Default for ReconnectConfig {
    /// Ten retries, fifteen seconds apart
    fn default() -> Self {
        Self::new(10, BackoffStrategy::default())
    }
}

/// Supervisor lifecycle
///
/// `Disconnected -> Connecting -> Connected` on success;
/// `Connecting -> RetryWait -> Connecting` on failure;
/// `RetryWait -> Failed` once retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Disconnected,
    Connecting,
    Connected,
    RetryWait,
    Failed,
}

impl SupervisorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::Connected | SupervisorState::Failed)
    }
}

/// A verified session and the check that verified it
pub struct Supervised<S: ?Sized> {
    pub session: Arc<S>,
    pub health: HealthStatus,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Opens sessions through one driver with bounded, cancellable retry
pub struct ConnectionSupervisor<D: DatabaseDriver> {
    driver: D,
    config: ReconnectConfig,
    checker: HealthChecker,
    state: parking_lot::Mutex<SupervisorState>,
    transitions: parking_lot::Mutex<Vec<SupervisorState>>,
}

impl<D: DatabaseDriver> ConnectionSupervisor<D> {
    pub fn new(driver: D, config: ReconnectConfig) -> Self {
        Self {
            driver,
            config,
            checker: HealthChecker::with_defaults(),
            state: parking_lot::Mutex::new(SupervisorState::Disconnected),
            transitions: parking_lot::Mutex::new(vec![SupervisorState::Disconnected]),
        }
    }

    pub fn with_checker(mut self, checker: HealthChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.lock()
    }

    /// Every state entered so far, in order
    pub fn transitions(&self) -> Vec<SupervisorState> {
        self.transitions.lock().clone()
    }

    fn transition(&self, next: SupervisorState) {
        let mut state = self.state.lock();
        tracing::trace!(from = ?*state, to = ?next, driver = self.driver.name(), "supervisor state");
        *state = next;
        self.transitions.lock().push(next);
    }

    /// Open and verify a session.
    ///
    /// Makes at most `max_retries + 1` attempts. Cancelling the token during a
    /// retry wait returns [`ConnectionError::Cancelled`]; an attempt already
    /// in flight is allowed to finish first.
    #[tracing::instrument(skip(self, cancel), fields(endpoint = %self.driver.endpoint()))]
    pub async fn connect(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Supervised<D::Session>, ConnectionError> {
        let mut remaining = i64::from(self.config.max_retries);
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                self.transition(SupervisorState::Disconnected);
                return Err(ConnectionError::Cancelled);
            }

            attempts += 1;
            self.transition(SupervisorState::Connecting);
            tracing::debug!(attempt = attempts, driver = self.driver.name(), "connecting");

            let error = match self.attempt().await {
                Ok((session, health)) => {
                    self.transition(SupervisorState::Connected);
                    tracing::info!(
                        driver = self.driver.name(),
                        attempts = attempts,
                        degraded = health.is_degraded(),
                        "connected"
                    );
                    return Ok(Supervised {
                        session,
                        health,
                        attempts,
                    });
                }
                Err(e) => e,
            };

            self.transition(SupervisorState::RetryWait);
            remaining -= 1;
            if remaining < 0 {
                self.transition(SupervisorState::Failed);
                tracing::error!(
                    driver = self.driver.name(),
                    attempts = attempts,
                    error = %error,
                    "giving up on connection"
                );
                return Err(ConnectionError::RetriesExhausted {
                    endpoint: self.driver.endpoint().to_string(),
                    attempts,
                    last_error: error.to_string(),
                });
            }

            let delay = self.config.backoff.calculate_delay(attempts - 1);
            tracing::warn!(
                driver = self.driver.name(),
                attempt = attempts,
                remaining = remaining,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "connection attempt failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    self.transition(SupervisorState::Disconnected);
                    return Err(ConnectionError::Cancelled);
                }
            }
        }
    }

    /// One attempt without retry, reporting the outcome as a status.
    ///
    /// A session opened by the probe is closed before returning.
    pub async fn probe(&self) -> HealthStatus {
        let endpoint = self.driver.endpoint();
        match self.attempt().await {
            Ok((session, health)) => {
                if let Err(e) = session.close().await {
                    tracing::debug!(error = %e, "closing probe session failed");
                }
                health
            }
            Err(e) => HealthStatus::closed(
                endpoint,
                e.to_string(),
                crate::health::check_socket(self.driver.liveness_artifact()),
            ),
        }
    }

    async fn attempt(&self) -> Result<(Arc<D::Session>, HealthStatus), ConnectionError> {
        let endpoint = self.driver.endpoint();

        let session = self
            .driver
            .connect()
            .await
            .map_err(|e| ConnectionError::Open {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let health = self
            .checker
            .check(endpoint, &*session, self.driver.liveness_artifact())
            .await;
        if !health.is_open() {
            if let Err(e) = session.close().await {
                tracing::debug!(error = %e, "closing unverified session failed");
            }
            return Err(ConnectionError::Ping {
                endpoint: endpoint.to_string(),
                reason: health.errors.join("; "),
            });
        }

        Ok((session, health))
    }
}
