//! MySQL driver implementation

use async_trait::async_trait;
use qdigest_core::{Connection, DatabaseDriver, Endpoint, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::MySqlConnection;

/// Default MySQL port
pub const DEFAULT_PORT: u16 = 3306;

/// MySQL database driver bound to one endpoint
pub struct MySqlDriver {
    endpoint: Endpoint,
    socket: Option<PathBuf>,
}

impl MySqlDriver {
    /// Create a new MySQL driver instance
    pub fn new(endpoint: Endpoint) -> Self {
        tracing::debug!(endpoint = %endpoint, "MySQL driver initialized");
        Self {
            endpoint,
            socket: None,
        }
    }

    /// Control socket whose presence is reported in health checks
    pub fn with_socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.socket = Some(socket.into());
        self
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    type Session = dyn Connection;

    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        let conn = MySqlConnection::connect(&self.endpoint).await?;
        Ok(Arc::new(conn))
    }

    fn liveness_artifact(&self) -> Option<&Path> {
        self.socket.as_deref()
    }
}
