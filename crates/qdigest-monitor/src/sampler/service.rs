//! Plan sampler implementation

use super::plan::scan_plan;
use qdigest_core::{Connection, SampleRecord, SamplingError, Value};
use tokio::sync::oneshot;

/// Most recent `SELECT` digest seen for a schema
pub const DIGEST_LOOKUP_QUERY: &str = "SELECT esh.DIGEST_TEXT \
     FROM performance_schema.events_statements_summary_by_digest essbd \
     INNER JOIN performance_schema.events_statements_history esh \
     ON essbd.DIGEST = esh.DIGEST \
     WHERE essbd.SCHEMA_NAME = ? \
     AND esh.EVENT_NAME = 'statement/sql/select' \
     AND esh.DIGEST_TEXT LIKE 'SELECT%' \
     ORDER BY essbd.LAST_SEEN DESC LIMIT 1";

/// Build the `EXPLAIN` statement for a monitored query
pub fn explain_statement(query: &str) -> String {
    format!("EXPLAIN {}", query.trim().trim_end_matches(';'))
}

/// Samples one monitored query per call
///
/// Each call runs two tasks at once: the application connection fires the
/// query while the administrative connection runs `EXPLAIN`. The digest
/// lookup waits until the query has fired, since only then can
/// `performance_schema` have seen it.
#[derive(Debug, Clone)]
pub struct PlanSampler {
    schema: String,
}

impl PlanSampler {
    /// Sample queries running against `schema`
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Fire `query` on `app`, explain it on `admin` and assemble the record
    ///
    /// An unconfirmed capture is logged and leaves the record's digest unset.
    #[tracing::instrument(skip(self, app, admin), fields(schema = %self.schema))]
    pub async fn sample<A, B>(
        &self,
        app: &A,
        admin: &B,
        query: &str,
        timestamp: i64,
    ) -> Result<SampleRecord, SamplingError>
    where
        A: Connection + ?Sized,
        B: Connection + ?Sized,
    {
        let (fired_tx, fired_rx) = oneshot::channel::<()>();

        let fire = async move {
            let result = app.query(query, &[]).await;
            if result.is_ok() {
                let _ = fired_tx.send(());
            }
            result
        };

        let extract = async {
            let explain_sql = explain_statement(query);
            let explain = admin.query(&explain_sql, &[]);
            let lookup = async {
                match fired_rx.await {
                    Ok(()) => self.lookup_digest(admin).await,
                    Err(_) => None,
                }
            };
            tokio::join!(explain, lookup)
        };

        let (fired, (explained, digest)) = tokio::join!(fire, extract);

        let fired = fired.map_err(|e| SamplingError::Query(e.to_string()))?;
        tracing::debug!(rows = fired.rows.len(), "monitored query fired");

        let explained = explained.map_err(|e| SamplingError::Explain(e.to_string()))?;
        let plan = scan_plan(&explained, query)?;

        let mut record = SampleRecord::new(query, timestamp, plan);
        if let Some(digest) = digest {
            record = record.with_digest(digest);
        }
        Ok(record)
    }

    async fn lookup_digest<B>(&self, admin: &B) -> Option<String>
    where
        B: Connection + ?Sized,
    {
        let params = [Value::String(self.schema.clone())];
        match admin.query(DIGEST_LOOKUP_QUERY, &params).await {
            Ok(result) => {
                let digest = result
                    .rows
                    .first()
                    .and_then(|row| row.get(0))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                if digest.is_none() {
                    tracing::warn!("monitored query not yet visible in performance_schema");
                }
                digest
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not confirm query capture");
                None
            }
        }
    }
}
