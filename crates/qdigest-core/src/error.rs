//! Error types for qdigest
//!
//! Drivers report [`DriverError`]. Pipeline components translate those into
//! the taxonomy below, which decides what is fatal at startup
//! ([`ConfigError`], [`ConnectionError`], [`ProvisioningError`]) and what is
//! recoverable per iteration ([`SamplingError`], [`WriteError`]).

use thiserror::Error;

/// Error returned by driver-level operations on a session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    /// The store rejected a create because the object is already there
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Session is closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DriverError {
    /// Whether this error reports an object that already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, DriverError::AlreadyExists(_))
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Serialization(err.to_string())
    }
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Configuration could not be assembled
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Please set missing configuration values: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Could not read configuration file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Could not parse configuration file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Opening or verifying a session failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("could not open connection to {endpoint}: {reason}")]
    Open { endpoint: String, reason: String },

    #[error("could not ping {endpoint}: {reason}")]
    Ping { endpoint: String, reason: String },

    #[error("could not connect to {endpoint} after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        last_error: String,
    },

    #[error("could not find the '{0}' database schema")]
    SchemaMissing(String),

    #[error("could not prepare the source instrumentation: {0}")]
    Setup(String),

    #[error("connection attempt cancelled")]
    Cancelled,
}

/// A non-idempotent provisioning step failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProvisioningError {
    #[error("invalid schema specification: {0}")]
    InvalidSpec(String),

    #[error("could not list databases: {0}")]
    ListDatabases(String),

    #[error("could not create database '{name}': {reason}")]
    CreateDatabase { name: String, reason: String },

    #[error("could not create user '{name}': {reason}")]
    CreatePrincipal { name: String, reason: String },

    #[error("could not list collections of '{database}': {reason}")]
    ListCollections { database: String, reason: String },

    #[error("could not create collection '{name}': {reason}")]
    CreateCollection { name: String, reason: String },

    #[error("could not grant read/write on '{collection}' to '{principal}': {reason}")]
    Grant {
        collection: String,
        principal: String,
        reason: String,
    },
}

/// One sampling pass failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("monitored query failed: {0}")]
    Query(String),

    #[error("EXPLAIN failed: {0}")]
    Explain(String),

    #[error("could not scan plan column '{column}': {reason}")]
    Scan { column: String, reason: String },

    #[error("EXPLAIN returned no plan rows for: {0}")]
    EmptyPlan(String),
}

/// Persisting one record failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    #[error("could not encode sample record: {0}")]
    Encode(String),

    #[error("could not insert sample record: {0}")]
    Insert(String),
}

/// Top-level pipeline error
#[derive(Error, Debug)]
pub enum DigestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl DigestError {
    /// Whether the pipeline may continue with the next iteration
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DigestError::Sampling(_) | DigestError::Write(_))
    }
}
