//! MySQL connection implementation

use async_trait::async_trait;
use mysql_async::{Conn, Opts, OptsBuilder, Row as MySqlRow, consts::ColumnType, prelude::*};
use qdigest_core::{
    ColumnMeta, Connection, DriverError, Endpoint, Protocol, QueryResult, Result, Row, Session,
    StatementResult, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// A single MySQL session
pub struct MySqlConnection {
    conn: tokio::sync::Mutex<Option<Conn>>,
    endpoint: String,
    closed: AtomicBool,
}

impl MySqlConnection {
    /// Connect to a MySQL server described by `endpoint`
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        tracing::info!(
            endpoint = %endpoint,
            database = ?endpoint.database(),
            "connecting to MySQL"
        );

        let conn = Conn::new(build_opts(endpoint))
            .await
            .map_err(|e| DriverError::Connection(format!("Failed to connect to MySQL: {}", e)))?;

        tracing::info!(endpoint = %endpoint, "MySQL connection established");
        Ok(Self {
            conn: tokio::sync::Mutex::new(Some(conn)),
            endpoint: endpoint.to_string(),
            closed: AtomicBool::new(false),
        })
    }
}

pub(crate) fn build_opts(endpoint: &Endpoint) -> Opts {
    let mut opts_builder = OptsBuilder::default();

    opts_builder = match endpoint.protocol() {
        Protocol::Tcp => opts_builder
            .ip_or_hostname(endpoint.host())
            .tcp_port(endpoint.port()),
        Protocol::Unix => opts_builder.socket(Some(endpoint.host())),
    };

    if let Some(db) = endpoint.database() {
        opts_builder = opts_builder.db_name(Some(db));
    }
    if let Some(credentials) = endpoint.credentials() {
        opts_builder = opts_builder
            .user(Some(credentials.username.as_str()))
            .pass(Some(credentials.password.as_str()));
    }

    opts_builder.into()
}

/// Escape a value for SQL literal inclusion
pub(crate) fn value_to_mysql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Decimal(v) => v.clone(),
        Value::String(v) => format!("'{}'", v.replace('\\', "\\\\").replace('\'', "''")),
        Value::Bytes(v) => {
            let hex: String = v.iter().map(|b| format!("{:02x}", b)).collect();
            format!("X'{}'", hex)
        }
        Value::Date(v) => format!("'{}'", v),
        Value::DateTime(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S")),
    }
}

/// Substitute `?` placeholders, in order, with literal values
///
/// Only placeholders of `sql` itself are replaced; a `?` inside a bound
/// literal is never treated as a further placeholder. Placeholders beyond the
/// supplied params are left as is.
pub(crate) fn bind_params(sql: &str, params: &[Value]) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut params = params.iter().peekable();
    for ch in sql.chars() {
        match params.next_if(|_| ch == '?') {
            Some(param) => result.push_str(&value_to_mysql_literal(param)),
            None => result.push(ch),
        }
    }
    result
}

/// Convert mysql_async Value to our Value type, using column type metadata
/// to interpret byte strings from the text protocol.
pub(crate) fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => {
                    s.parse::<i64>().map(Value::Int64).unwrap_or(Value::String(s))
                }
                // FLOAT text is parsed at double precision to keep the
                // server's decimal digits
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Value::Decimal(s)
                }
                _ => Value::String(s),
            },
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => {
            if u <= i64::MAX as u64 {
                Value::Int64(u as i64)
            } else {
                Value::Decimal(u.to_string())
            }
        }
        // Shortest decimal form of the f32, so 33.33 stays 33.33 and not 33.33000183
        mysql_async::Value::Float(f) => {
            Value::Float64(f.to_string().parse().unwrap_or(f as f64))
        }
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            if hour == 0 && min == 0 && sec == 0 && micro == 0 {
                date.map(Value::Date).unwrap_or_else(|| {
                    Value::String(format!("{:04}-{:02}-{:02}", year, month, day))
                })
            } else {
                date.and_then(|d| d.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro))
                    .map(Value::DateTime)
                    .unwrap_or_else(|| {
                        Value::String(format!(
                            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                            year, month, day, hour, min, sec
                        ))
                    })
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + (hours as u32);
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

fn rows_to_result(mysql_rows: Vec<MySqlRow>) -> (Vec<ColumnMeta>, Vec<Row>) {
    let mut columns = Vec::new();
    let mut column_names = Vec::new();
    let mut column_types = Vec::new();

    if let Some(first_row) = mysql_rows.first() {
        for (idx, col) in first_row.columns_ref().iter().enumerate() {
            let name = col.name_str().to_string();
            column_names.push(name.clone());
            column_types.push(col.column_type());
            columns.push(ColumnMeta {
                name,
                data_type: format!("{:?}", col.column_type()),
                ordinal: idx,
            });
        }
    }

    let rows = mysql_rows
        .into_iter()
        .map(|mysql_row| {
            let values = (0..columns.len())
                .map(|idx| {
                    let mysql_val: mysql_async::Value =
                        mysql_row.get(idx).unwrap_or(mysql_async::Value::NULL);
                    let col_type = column_types
                        .get(idx)
                        .copied()
                        .unwrap_or(ColumnType::MYSQL_TYPE_STRING);
                    mysql_value_to_value(mysql_val, col_type)
                })
                .collect();
            Row::new(column_names.clone(), values)
        })
        .collect();

    (columns, rows)
}

#[async_trait]
impl Session for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    async fn ping(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed)?;
        conn.ping()
            .await
            .map_err(|e| DriverError::Connection(format!("MySQL ping failed: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        self.closed.store(true, Ordering::SeqCst);
        tracing::info!(endpoint = %self.endpoint, "closing MySQL connection");
        conn.disconnect()
            .await
            .map_err(|e| DriverError::Connection(format!("Failed to close MySQL connection: {}", e)))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let final_sql = bind_params(sql, params);

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed)?;
        conn.query_drop(&final_sql)
            .await
            .map_err(|e| DriverError::Query(format!("Failed to execute statement: {}", e)))?;
        let affected_rows = conn.affected_rows();

        tracing::debug!(affected_rows = affected_rows, "statement executed");
        Ok(StatementResult { affected_rows })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        let final_sql = bind_params(sql, params);

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed)?;
        let mysql_rows: Vec<MySqlRow> = conn
            .query(&final_sql)
            .await
            .map_err(|e| DriverError::Query(format!("Failed to execute query: {}", e)))?;
        drop(guard);

        let (columns, rows) = rows_to_result(mysql_rows);
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms,
        })
    }
}
