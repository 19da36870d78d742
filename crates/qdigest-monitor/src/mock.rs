//! Scripted connection shared by the unit tests

use async_trait::async_trait;
use qdigest_core::{
    Connection, DriverError, QueryResult, Result, Session, StatementResult, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Connection answering queries by SQL substring and logging every statement
#[derive(Default)]
pub struct MockConnection {
    /// First matching pattern wins; unmatched queries return an empty result
    pub query_responses: Vec<(String, QueryResult)>,
    /// Statements containing any of these patterns fail
    pub failing: Vec<String>,
    pub query_log: Arc<parking_lot::Mutex<Vec<String>>>,
    /// Each statement completes, and is logged, only after this delay
    pub delay: Option<Duration>,
    closed: AtomicBool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

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

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Log into `log` instead of a private one
    pub fn with_shared_log(mut self, log: Arc<parking_lot::Mutex<Vec<String>>>) -> Self {
        self.query_log = log;
        self
    }

    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }

    async fn log(&self, sql: &str) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.query_log.lock().push(sql.to_string());
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
        self.log(sql).await?;
        Ok(StatementResult { affected_rows: 0 })
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.log(sql).await?;
        Ok(self
            .query_responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }
}
