//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use qdigest_core::{
    Connection, DatabaseDriver, DigestConfig, Document, DocumentStore, DriverError, Endpoint,
    Principal, QueryResult, Result, Session, Settings, StatementResult, Value,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub const QUERY: &str = "SELECT * FROM employees WHERE emp_no = 10001";
pub const DIGEST: &str = "SELECT * FROM `employees` WHERE `emp_no` = ?";

/// Shared log of statements across several mock sessions
pub type StatementLog = Arc<parking_lot::Mutex<Vec<String>>>;

/// Mock source connection answering queries by SQL substring.
///
/// Unmatched queries return an empty result. Statements containing any
/// `failing` pattern are rejected.
pub struct MockConnection {
    pub name: String,
    pub query_responses: Vec<(String, QueryResult)>,
    pub failing: Vec<String>,
    pub query_log: StatementLog,
    pub closes: AtomicU32,
    closed: AtomicBool,
}

impl MockConnection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query_responses: Vec::new(),
            failing: Vec::new(),
            query_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
            closes: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a response for queries containing the given SQL pattern.
    pub fn with_query_response(
        mut self,
        sql_contains: impl Into<String>,
        result: QueryResult,
    ) -> Self {
        self.query_responses.push((sql_contains.into(), result));
        self
    }

    pub fn failing_on(mut self, sql_contains: impl Into<String>) -> Self {
        self.failing.push(sql_contains.into());
        self
    }

    pub fn with_shared_log(mut self, log: StatementLog) -> Self {
        self.query_log = log;
        self
    }

    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }

    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    fn log(&self, sql: &str) -> Result<()> {
        self.query_log.lock().push(format!("{}: {}", self.name, sql));
        if self.failing.iter().any(|p| sql.contains(p.as_str())) {
            return Err(DriverError::Query(format!("rejected: {}", sql)));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        self.log(sql)?;
        Ok(StatementResult { affected_rows: 0 })
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.log(sql)?;
        Ok(self
            .query_responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(QueryResult::empty))
    }
}

/// Provisioned objects of a [`MemoryStore`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub databases: BTreeSet<String>,
    pub users: BTreeSet<(String, String)>,
    pub collections: BTreeMap<String, BTreeSet<String>>,
    pub grants: BTreeSet<(String, String, String)>,
}

/// In-memory document store
#[derive(Default)]
pub struct MemoryStore {
    pub state: parking_lot::Mutex<StoreState>,
    pub documents: parking_lot::Mutex<HashMap<(String, String), Vec<Document>>>,
    /// The next `n` inserts fail
    pub failing_inserts: AtomicU32,
    pub fail_grant: bool,
    pub closes: AtomicU32,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_inserts(self, n: u32) -> Self {
        self.failing_inserts.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_failing_grant(mut self) -> Self {
        self.fail_grant = true;
        self
    }

    pub fn state(&self) -> StoreState {
        self.state.lock().clone()
    }

    pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.documents
            .lock()
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MemoryStore {
    fn driver_name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().databases.iter().cloned().collect())
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        if !self.state.lock().databases.insert(name.to_string()) {
            return Err(DriverError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }

    async fn create_principal(&self, database: &str, principal: &Principal) -> Result<()> {
        let user = (database.to_string(), principal.username.clone());
        if !self.state.lock().users.insert(user) {
            return Err(DriverError::AlreadyExists(principal.username.clone()));
        }
        Ok(())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .collections
            .get(database)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_collection(&self, database: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state
            .collections
            .entry(database.to_string())
            .or_default()
            .insert(name.to_string())
        {
            return Err(DriverError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }

    async fn grant_read_write(
        &self,
        database: &str,
        collection: &str,
        principal: &Principal,
    ) -> Result<()> {
        if self.fail_grant {
            return Err(DriverError::Driver("not authorized on admin".to_string()));
        }
        self.state.lock().grants.insert((
            database.to_string(),
            collection.to_string(),
            principal.username.clone(),
        ));
        Ok(())
    }

    async fn insert_document(&self, database: &str, collection: &str, doc: Document) -> Result<()> {
        let remaining = self.failing_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_inserts.store(remaining - 1, Ordering::SeqCst);
            return Err(DriverError::Query("write concern timeout".to_string()));
        }
        self.documents
            .lock()
            .entry((database.to_string(), collection.to_string()))
            .or_default()
            .push(doc);
        Ok(())
    }

    async fn find_documents(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        Ok(self.documents(database, collection))
    }
}

/// Driver handing out one prepared session, or refusing every connect
pub struct MockDriver<S: ?Sized> {
    endpoint: Endpoint,
    session: Option<Arc<S>>,
    pub connects: AtomicU32,
}

impl<S: ?Sized> MockDriver<S> {
    pub fn serving(session: Arc<S>) -> Self {
        Self {
            endpoint: Endpoint::tcp("127.0.0.1", 0),
            session: Some(session),
            connects: AtomicU32::new(0),
        }
    }

    pub fn refusing() -> Self {
        Self {
            endpoint: Endpoint::tcp("127.0.0.1", 0),
            session: None,
            connects: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver<dyn Connection> {
    type Session = dyn Connection;

    fn name(&self) -> &'static str {
        "MockSql"
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.session
            .clone()
            .ok_or_else(|| DriverError::Connection("connection refused".to_string()))
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver<dyn DocumentStore> {
    type Session = dyn DocumentStore;

    fn name(&self) -> &'static str {
        "MockStore"
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn connect(&self) -> Result<Arc<dyn DocumentStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.session
            .clone()
            .ok_or_else(|| DriverError::Connection("connection refused".to_string()))
    }
}

pub fn explain_result() -> QueryResult {
    QueryResult::from_rows(
        &[
            "id",
            "select_type",
            "table",
            "partitions",
            "type",
            "possible_keys",
            "key",
            "key_len",
            "ref",
            "rows",
            "filtered",
            "Extra",
        ],
        vec![vec![
            Value::Int64(1),
            Value::String("SIMPLE".to_string()),
            Value::String("employees".to_string()),
            Value::Null,
            Value::String("const".to_string()),
            Value::String("PRIMARY".to_string()),
            Value::String("PRIMARY".to_string()),
            Value::String("4".to_string()),
            Value::String("const".to_string()),
            Value::Int64(1),
            Value::Float64(100.0),
            Value::Null,
        ]],
    )
}

/// Admin connection that passes setup, explains the query and finds its digest
pub fn source_admin(name: &str) -> MockConnection {
    MockConnection::new(name)
        .with_query_response(
            "INFORMATION_SCHEMA.SCHEMATA",
            QueryResult::from_rows(&["SCHEMA_NAME"], vec![vec![Value::String("mysql".to_string())]]),
        )
        .with_query_response("EXPLAIN", explain_result())
        .with_query_response(
            "performance_schema",
            QueryResult::from_rows(&["DIGEST_TEXT"], vec![vec![Value::String(DIGEST.to_string())]]),
        )
}

pub fn source_app(name: &str) -> MockConnection {
    MockConnection::new(name).with_query_response(
        "SELECT * FROM employees",
        QueryResult::from_rows(&["emp_no"], vec![vec![Value::Int64(10001)]]),
    )
}

/// Settings for a three-iteration run with immediate retry exhaustion
pub fn settings() -> Settings {
    let vars: HashMap<&str, &str> = [
        ("MYSQL_USER", "digest"),
        ("MYSQL_PASSWORD", "secret"),
        ("MYSQL_HOST", "127.0.0.1"),
        ("MYSQL_PORT", "3306"),
        ("STORE_ADDRESS", "localhost:27017"),
        ("STORE_DATABASE", "QueryDigest"),
        ("STORE_USERNAME", "harvester"),
        ("STORE_PASSWORD", "hunter2"),
        ("DIGEST_QUERY", QUERY),
        ("DIGEST_ITERATIONS", "3"),
        ("DIGEST_INTERVAL_MS", "0"),
        ("DIGEST_MAX_RETRIES", "0"),
        ("DIGEST_RETRY_BACKOFF_MS", "10"),
    ]
    .into_iter()
    .collect();

    let mut config = DigestConfig::default();
    config
        .apply_env(|key| vars.get(key).map(|v| v.to_string()))
        .expect("test variables parse");
    config.resolve().expect("test settings resolve")
}
