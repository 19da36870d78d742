//! Slow query log setup

use qdigest_core::{Connection, ConnectionError};

/// Confirms the server's system schema is present
pub const SCHEMA_CHECK_QUERY: &str =
    "SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = 'mysql'";

/// Schema that must exist on the source server
pub const SYSTEM_SCHEMA: &str = "mysql";

/// Statements enabling the slow query log, issued in order
pub const SLOW_LOG_STATEMENTS: &[&str] = &[
    "USE mysql",
    "SET @@GLOBAL.slow_query_log = 'ON'",
    "SET long_query_time = 0",
    "SET @@GLOBAL.long_query_time = 0",
    "SET @@GLOBAL.log_slow_admin_statements = 'ON'",
    "SET @@GLOBAL.log_slow_slave_statements = 'ON'",
    "SET sql_log_off = 'ON'",
    "SET @@GLOBAL.sql_log_off = 'ON'",
    "SET @@GLOBAL.log_queries_not_using_indexes = 'ON'",
];

/// Quote an identifier with backticks
fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// One-time preparation of the source server
#[derive(Debug, Clone)]
pub struct InstrumentationSetup {
    schema: String,
    max_connections: Option<u32>,
}

impl InstrumentationSetup {
    /// `schema` is restored as the default database once setup finishes
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            max_connections: None,
        }
    }

    pub fn with_max_connections(mut self, max_connections: Option<u32>) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn max_connections(&self) -> Option<u32> {
        self.max_connections
    }

    /// Every statement `apply` sends, in order
    pub fn statements(&self) -> Vec<String> {
        let mut statements = Vec::with_capacity(SLOW_LOG_STATEMENTS.len() + 3);
        statements.push(SCHEMA_CHECK_QUERY.to_string());
        if let Some(limit) = self.max_connections {
            statements.push(max_connections_statement(limit));
        }
        statements.extend(SLOW_LOG_STATEMENTS.iter().map(|s| s.to_string()));
        statements.push(self.restore_schema_statement());
        statements
    }

    fn restore_schema_statement(&self) -> String {
        format!("USE {}", quote_identifier(&self.schema))
    }

    /// Verify the system schema, apply the connection limit and enable the slow log
    ///
    /// A failed connection limit is logged and skipped. Any other failure is fatal.
    #[tracing::instrument(skip(self, conn), fields(schema = %self.schema))]
    pub async fn apply<C>(&self, conn: &C) -> Result<(), ConnectionError>
    where
        C: Connection + ?Sized,
    {
        tracing::info!(sql = SCHEMA_CHECK_QUERY, "checking system schema");
        let found = conn
            .query(SCHEMA_CHECK_QUERY, &[])
            .await
            .map_err(|e| ConnectionError::Setup(e.to_string()))?;
        if found.is_empty() {
            return Err(ConnectionError::SchemaMissing(SYSTEM_SCHEMA.to_string()));
        }

        if let Some(limit) = self.max_connections {
            let sql = max_connections_statement(limit);
            if let Err(e) = conn.execute(&sql, &[]).await {
                tracing::warn!(max_connections = limit, error = %e, "could not set max_connections");
            }
        }

        for statement in SLOW_LOG_STATEMENTS {
            tracing::info!(sql = statement, "enabling slow query log");
            conn.execute(statement, &[])
                .await
                .map_err(|e| ConnectionError::Setup(format!("{}: {}", statement, e)))?;
        }

        let restore = self.restore_schema_statement();
        conn.execute(&restore, &[])
            .await
            .map_err(|e| ConnectionError::Setup(format!("{}: {}", restore, e)))?;

        tracing::info!("source instrumentation ready");
        Ok(())
    }
}

fn max_connections_statement(limit: u32) -> String {
    format!("SET GLOBAL max_connections = {}", limit)
}
