//! Scoped ownership of a connected session

use qdigest_core::{Result, Session};
use std::sync::Arc;

/// Owns one session and closes it exactly once through [`SessionGuard::release`]
pub struct SessionGuard<S: Session + ?Sized> {
    role: &'static str,
    session: Arc<S>,
    released: bool,
}

impl<S: Session + ?Sized> SessionGuard<S> {
    /// Guard `session`, naming its role (e.g. "source-admin") in logs
    pub fn new(role: &'static str, session: Arc<S>) -> Self {
        Self {
            role,
            session,
            released: false,
        }
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// Close the session. A session that is already closed is left alone.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        if self.session.is_closed() {
            tracing::debug!(role = self.role, "session already closed");
            return Ok(());
        }
        tracing::debug!(role = self.role, driver = self.session.driver_name(), "releasing session");
        self.session.close().await
    }
}

impl<S: Session + ?Sized> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if !self.released && !self.session.is_closed() {
            tracing::warn!(role = self.role, "session guard dropped without release");
        }
    }
}
