//! Source-side tests against a real MySQL server

use crate::fixtures::MONITORED_QUERY;
use crate::test_containers::{SOURCE_SCHEMA, mysql_container};
use pretty_assertions::assert_eq;
use qdigest_connection::{
    BackoffStrategy, Connectivity, ConnectionSupervisor, ReconnectConfig, SocketState,
    SupervisorState,
};
use qdigest_core::{Connection, ConnectionError, DatabaseDriver, Endpoint, Session};
use qdigest_driver_mysql::MySqlDriver;
use qdigest_monitor::{InstrumentationSetup, PlanSampler, explain_statement, scan_plan};
use tokio_util::sync::CancellationToken;

async fn source_driver() -> anyhow::Result<MySqlDriver> {
    let info = mysql_container().await?;
    Ok(MySqlDriver::new(info.endpoint().with_database(SOURCE_SCHEMA)))
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_supervised_connect_reports_open_status() -> anyhow::Result<()> {
    let driver = source_driver().await?.with_socket("/nonexistent/mysqld.sock");
    let supervisor = ConnectionSupervisor::new(
        driver,
        ReconnectConfig::new(2, BackoffStrategy::fixed(100)),
    );

    let supervised = supervisor.connect(&CancellationToken::new()).await?;

    assert_eq!(supervised.attempts, 1);
    assert_eq!(supervised.health.connectivity, Connectivity::Open);
    assert!(supervised.health.errors.is_empty());
    // The socket lives inside the container, so the status is degraded only
    assert!(matches!(supervised.health.socket, SocketState::Missing { .. }));
    assert!(supervised.health.is_degraded());
    assert_eq!(supervisor.state(), SupervisorState::Connected);

    supervised.session.close().await?;
    assert!(supervised.session.is_closed());
    Ok(())
}

#[tokio::test]
#[ignore = "requires local networking"]
async fn test_unreachable_port_exhausts_retries() -> anyhow::Result<()> {
    // Nothing listens on the discard port
    let driver = MySqlDriver::new(Endpoint::tcp("127.0.0.1", 9));
    let supervisor = ConnectionSupervisor::new(
        driver,
        ReconnectConfig::new(1, BackoffStrategy::fixed(10)),
    );

    let err = match supervisor.connect(&CancellationToken::new()).await {
        Ok(_) => anyhow::bail!("connect to a closed port should fail"),
        Err(e) => e,
    };

    assert!(matches!(err, ConnectionError::RetriesExhausted { attempts: 2, .. }));
    assert_eq!(supervisor.state(), SupervisorState::Failed);
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_instrumentation_setup_enables_slow_log() -> anyhow::Result<()> {
    let conn = source_driver().await?.connect().await?;

    InstrumentationSetup::new(SOURCE_SCHEMA).apply(&*conn).await?;

    let result = conn
        .query("SELECT @@GLOBAL.slow_query_log, @@GLOBAL.long_query_time", &[])
        .await?;
    let row = result.rows.first().ok_or_else(|| anyhow::anyhow!("no row"))?;
    assert_eq!(row.get(0).and_then(|v| v.as_i64()), Some(1));
    assert_eq!(row.get(1).and_then(|v| v.as_f64()), Some(0.0));

    let current = conn.query("SELECT DATABASE()", &[]).await?;
    assert_eq!(
        current.rows[0].get(0).and_then(|v| v.as_str()),
        Some(SOURCE_SCHEMA)
    );

    conn.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_explain_of_primary_key_lookup_scans() -> anyhow::Result<()> {
    let conn = source_driver().await?.connect().await?;

    let result = conn.query(&explain_statement(MONITORED_QUERY), &[]).await?;
    let plan = scan_plan(&result, MONITORED_QUERY)?;

    assert_eq!(plan.len(), 1);
    let row = &plan[0];
    assert_eq!(row.id, 1);
    assert_eq!(row.rows, 1);
    assert_eq!(row.key.as_deref(), Some("PRIMARY"));
    assert_eq!(row.key_len.as_deref(), Some("4"));
    assert_eq!(row.access_type.as_deref(), Some("const"));
    assert_eq!(row.partitions, None);
    assert_eq!(row.extra, None);

    conn.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sampler_against_live_server() -> anyhow::Result<()> {
    let driver = source_driver().await?;
    let admin = driver.connect().await?;
    let app = driver.connect().await?;
    InstrumentationSetup::new(SOURCE_SCHEMA).apply(&*admin).await?;

    let record = PlanSampler::new(SOURCE_SCHEMA)
        .sample(&*app, &*admin, MONITORED_QUERY, 1_700_000_000)
        .await?;

    assert_eq!(record.search, MONITORED_QUERY);
    assert_eq!(record.timestamp, 1_700_000_000);
    assert_eq!(record.plan[0].key.as_deref(), Some("PRIMARY"));

    app.close().await?;
    admin.close().await?;
    Ok(())
}
