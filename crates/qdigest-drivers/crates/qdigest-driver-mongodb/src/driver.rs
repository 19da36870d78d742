//! MongoDB driver implementation

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, doc};
use futures::TryStreamExt;
use mongodb::{Client, options::ClientOptions};
use qdigest_core::{
    DatabaseDriver, Document, DocumentStore, DriverError, Endpoint, Principal, Result, Session,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::commands;

/// Default MongoDB port
pub const DEFAULT_PORT: u16 = 27017;

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// MongoDB database driver bound to one endpoint
pub struct MongoDbDriver {
    endpoint: Endpoint,
}

impl MongoDbDriver {
    /// Create a new MongoDB driver instance
    pub fn new(endpoint: Endpoint) -> Self {
        tracing::debug!(endpoint = %endpoint, "MongoDB driver initialized");
        Self { endpoint }
    }

    /// Build the `mongodb://` URI for the endpoint
    ///
    /// Credentials authenticate against the endpoint's database when one is
    /// set (the service principal lives there) and against `admin` otherwise.
    pub fn build_connection_string(&self) -> String {
        let endpoint = &self.endpoint;
        let mut conn_str = String::from("mongodb://");

        if let Some(credentials) = endpoint.credentials() {
            conn_str.push_str(&urlencoding::encode(&credentials.username));
            conn_str.push(':');
            conn_str.push_str(&urlencoding::encode(&credentials.password));
            conn_str.push('@');
        }

        conn_str.push_str(endpoint.host());
        conn_str.push(':');
        let port = if endpoint.port() > 0 {
            endpoint.port()
        } else {
            DEFAULT_PORT
        };
        conn_str.push_str(&port.to_string());
        conn_str.push('/');

        if endpoint.credentials().is_some() {
            let auth_source = endpoint.database().unwrap_or("admin");
            conn_str.push_str("?authSource=");
            conn_str.push_str(&urlencoding::encode(auth_source));
        }

        conn_str
    }
}

#[async_trait]
impl DatabaseDriver for MongoDbDriver {
    type Session = dyn DocumentStore;

    fn name(&self) -> &'static str {
        "MongoDB"
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>> {
        tracing::debug!("connecting to MongoDB");

        let mut client_options = ClientOptions::parse(self.build_connection_string())
            .await
            .map_err(|e| DriverError::Connection(format!("Failed to parse MongoDB options: {}", e)))?;
        client_options.app_name = Some("qdigest".to_string());
        client_options.max_pool_size = Some(1);
        client_options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);

        let client = Client::with_options(client_options)
            .map_err(|e| DriverError::Connection(format!("Failed to create MongoDB client: {}", e)))?;

        let conn = MongoDbConnection::new(client, self.endpoint.to_string());
        conn.ping().await?;

        tracing::info!(endpoint = %self.endpoint, "MongoDB connection established");
        Ok(Arc::new(conn))
    }
}

/// A single MongoDB client session
pub struct MongoDbConnection {
    client: tokio::sync::Mutex<Option<Client>>,
    endpoint: String,
    closed: AtomicBool,
}

impl MongoDbConnection {
    /// Create a new MongoDB connection wrapper
    pub fn new(client: Client, endpoint: String) -> Self {
        Self {
            client: tokio::sync::Mutex::new(Some(client)),
            endpoint,
            closed: AtomicBool::new(false),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client.lock().await.clone().ok_or(DriverError::Closed)
    }

    /// Execute a command on a database
    async fn run_command(
        &self,
        database: &str,
        command: BsonDocument,
        context: &str,
    ) -> Result<BsonDocument> {
        self.client()
            .await?
            .database(database)
            .run_command(command)
            .await
            .map_err(|e| commands::classify_error(e, context))
    }
}

/// Convert a stored BSON value to JSON
pub(crate) fn bson_to_json(bson: &Bson) -> serde_json::Value {
    match bson {
        Bson::Null | Bson::Undefined | Bson::MaxKey | Bson::MinKey => serde_json::Value::Null,
        Bson::Boolean(b) => serde_json::Value::Bool(*b),
        Bson::Int32(i) => serde_json::Value::from(*i),
        Bson::Int64(i) => serde_json::Value::from(*i),
        Bson::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Bson::String(s) | Bson::Symbol(s) | Bson::JavaScriptCode(s) => {
            serde_json::Value::String(s.clone())
        }
        Bson::Array(arr) => serde_json::Value::Array(arr.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => serde_json::Value::Object(bson_document_to_json(doc)),
        Bson::ObjectId(oid) => serde_json::Value::String(oid.to_hex()),
        Bson::DateTime(dt) => serde_json::Value::from(dt.timestamp_millis()),
        Bson::Decimal128(d) => serde_json::Value::String(d.to_string()),
        Bson::Timestamp(ts) => serde_json::Value::from(ts.time),
        other => serde_json::Value::String(other.to_string()),
    }
}

pub(crate) fn bson_document_to_json(doc: &BsonDocument) -> Document {
    doc.iter()
        .map(|(k, v)| (k.clone(), bson_to_json(v)))
        .collect()
}

/// Convert JSON to BSON, keeping integers as Int64 and fractions as Double
pub(crate) fn json_to_bson(value: &serde_json::Value) -> Bson {
    match value {
        serde_json::Value::Null => Bson::Null,
        serde_json::Value::Bool(b) => Bson::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Bson::String(s.clone()),
        serde_json::Value::Array(arr) => Bson::Array(arr.iter().map(json_to_bson).collect()),
        serde_json::Value::Object(map) => Bson::Document(json_to_bson_document(map)),
    }
}

pub(crate) fn json_to_bson_document(map: &Document) -> BsonDocument {
    map.iter()
        .map(|(k, v)| (k.clone(), json_to_bson(v)))
        .collect()
}

/// URL encoding helper for URI userinfo
pub(crate) mod urlencoding {
    pub fn encode(s: &str) -> String {
        let mut result = String::with_capacity(s.len() * 3);
        for c in s.chars() {
            match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(c),
                _ => {
                    let mut buf = [0u8; 4];
                    for b in c.encode_utf8(&mut buf).as_bytes() {
                        result.push_str(&format!("%{:02X}", b));
                    }
                }
            }
        }
        result
    }
}

#[async_trait]
impl Session for MongoDbConnection {
    fn driver_name(&self) -> &str {
        "mongodb"
    }

    async fn ping(&self) -> Result<()> {
        self.client()
            .await?
            .database("admin")
            .run_command(commands::ping_command())
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Connection(format!("MongoDB ping failed: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        let Some(client) = self.client.lock().await.take() else {
            return Ok(());
        };
        self.closed.store(true, Ordering::SeqCst);
        tracing::info!(endpoint = %self.endpoint, "closing MongoDB connection");
        client.shutdown().await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MongoDbConnection {
    async fn list_databases(&self) -> Result<Vec<String>> {
        self.client()
            .await?
            .list_database_names()
            .await
            .map_err(|e| commands::classify_error(e, "listDatabases"))
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        // MongoDB creates a database implicitly with its first collection.
        tracing::debug!(database = %name, "database will be created with its first collection");
        Ok(())
    }

    #[tracing::instrument(skip(self, principal), fields(user = %principal.username))]
    async fn create_principal(&self, database: &str, principal: &Principal) -> Result<()> {
        self.run_command(
            database,
            commands::create_user_command(principal),
            "createUser",
        )
        .await?;
        Ok(())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        self.client()
            .await?
            .database(database)
            .list_collection_names()
            .await
            .map_err(|e| commands::classify_error(e, "listCollections"))
    }

    #[tracing::instrument(skip(self))]
    async fn create_collection(&self, database: &str, name: &str) -> Result<()> {
        self.client()
            .await?
            .database(database)
            .create_collection(name)
            .await
            .map_err(|e| commands::classify_error(e, "create"))
    }

    #[tracing::instrument(skip(self, principal), fields(user = %principal.username))]
    async fn grant_read_write(
        &self,
        database: &str,
        collection: &str,
        principal: &Principal,
    ) -> Result<()> {
        match self
            .run_command(
                database,
                commands::create_role_command(database, collection),
                "createRole",
            )
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => {
                tracing::debug!(role = %commands::role_name(collection), "role already exists");
            }
            Err(e) => return Err(e),
        }

        self.run_command(
            database,
            commands::grant_role_command(database, collection, principal),
            "grantRolesToUser",
        )
        .await?;
        Ok(())
    }

    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        doc: Document,
    ) -> Result<()> {
        let bson_doc = json_to_bson_document(&doc);
        self.client()
            .await?
            .database(database)
            .collection::<BsonDocument>(collection)
            .insert_one(bson_doc)
            .await
            .map_err(|e| DriverError::Query(format!("Failed to insert document: {}", e)))?;
        Ok(())
    }

    async fn find_documents(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        let cursor = self
            .client()
            .await?
            .database(database)
            .collection::<BsonDocument>(collection)
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| DriverError::Query(format!("Failed to query documents: {}", e)))?;

        let docs: Vec<BsonDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| DriverError::Query(format!("Failed to read documents: {}", e)))?;

        Ok(docs.iter().map(bson_document_to_json).collect())
    }
}
