//! Session traits for the source database and the destination document store

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;

/// A stored document, as a JSON object
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Lifecycle shared by every live session, relational or document
#[async_trait]
pub trait Session: Send + Sync {
    /// Get the driver name (e.g., "mysql", "mongodb")
    fn driver_name(&self) -> &str;

    /// Verify the session is still usable with a protocol-level round trip
    async fn ping(&self) -> Result<()>;

    /// Close the session. Closing an already closed session is a no-op.
    async fn close(&self) -> Result<()>;

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;
}

/// A relational database connection
#[async_trait]
pub trait Connection: Session {
    /// Execute a statement that returns no rows (SET, USE, ...)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT, EXPLAIN)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;
}

/// A service principal provisioned in the document store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub password: String,
}

impl Principal {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A session on the destination document store
///
/// Create operations report [`crate::DriverError::AlreadyExists`] when the
/// target is already present, so callers can treat them as idempotent.
#[async_trait]
pub trait DocumentStore: Session {
    /// List database names
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Create a database
    async fn create_database(&self, name: &str) -> Result<()>;

    /// Create a user that authenticates against `database`
    async fn create_principal(&self, database: &str, principal: &Principal) -> Result<()>;

    /// List collection names within a database
    async fn list_collections(&self, database: &str) -> Result<Vec<String>>;

    /// Create a collection
    async fn create_collection(&self, database: &str, name: &str) -> Result<()>;

    /// Grant the principal read/write access on one collection
    async fn grant_read_write(
        &self,
        database: &str,
        collection: &str,
        principal: &Principal,
    ) -> Result<()>;

    /// Insert one document
    async fn insert_document(&self, database: &str, collection: &str, doc: Document)
        -> Result<()>;

    /// Return every document of a collection, in insertion order
    async fn find_documents(&self, database: &str, collection: &str) -> Result<Vec<Document>>;
}
