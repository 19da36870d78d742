//! Database driver trait definition

use crate::{Result, Session};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Transport used to reach a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Unix,
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "unix" | "socket" => Ok(Protocol::Unix),
            other => Err(format!("expected tcp or unix, got {:?}", other)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Unix => write!(f, "unix"),
        }
    }
}

/// Username and password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to reach a server. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    protocol: Protocol,
    credentials: Option<Credentials>,
    database: Option<String>,
}

impl Endpoint {
    /// Create a TCP endpoint without credentials
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: Protocol::Tcp,
            credentials: None,
            database: None,
        }
    }

    /// Create an endpoint over a unix socket; `path` takes the place of the host
    pub fn unix(path: impl Into<String>) -> Self {
        Self {
            host: path.into(),
            port: 0,
            protocol: Protocol::Unix,
            credentials: None,
            database: None,
        }
    }

    /// Parse a `host:port` address into a TCP endpoint
    pub fn parse_address(address: &str) -> std::result::Result<Self, String> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got {:?}", address))?;
        if host.is_empty() {
            return Err(format!("missing host in {:?}", address));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port {:?}: {}", port, e))?;
        Ok(Self::tcp(host, port))
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::Tcp => write!(f, "tcp://{}:{}", self.host, self.port),
            Protocol::Unix => write!(f, "unix://{}", self.host),
        }
    }
}

/// Core driver trait: knows one endpoint and opens sessions against it
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// The session type produced by `connect`
    type Session: Session + ?Sized;

    /// Human-readable name (e.g., "MySQL", "MongoDB")
    fn name(&self) -> &'static str;

    /// The endpoint this driver connects to
    fn endpoint(&self) -> &Endpoint;

    /// Open a new session
    async fn connect(&self) -> Result<Arc<Self::Session>>;

    /// A local file whose presence signals the server is alive (e.g., the
    /// MySQL control socket). `None` when the driver has no such artifact.
    fn liveness_artifact(&self) -> Option<&Path> {
        None
    }
}
