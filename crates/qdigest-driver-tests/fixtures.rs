//! Shared fixtures: settings and sessions against the test containers

use crate::test_containers::{ContainerInfo, SOURCE_SCHEMA, mongo_container, mysql_container};
use qdigest_core::{
    Credentials, Iterations, Principal, Settings,
    config::{DEFAULT_SOCKET, DestinationSettings, RetrySettings, SourceSettings},
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Query sampled by the end-to-end tests
pub const MONITORED_QUERY: &str = "SELECT * FROM employees WHERE emp_no = 10001";

static DATABASE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A destination database name no other test in this process uses
pub fn unique_database(prefix: &str) -> String {
    let n = DATABASE_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}_{}_{}", prefix, std::process::id(), n)
}

/// Settings pointing at both containers, writing into `database`
pub fn settings_for(
    source: &ContainerInfo,
    store: &ContainerInfo,
    database: &str,
    iterations: u64,
) -> Settings {
    let store_endpoint = store.endpoint();
    let principal = Principal::new("harvester", "harvester-secret");

    Settings {
        source: SourceSettings {
            endpoint: source.endpoint().with_database(SOURCE_SCHEMA),
            // Lives inside the container, so the source reports degraded
            socket: DEFAULT_SOCKET.into(),
            schema: SOURCE_SCHEMA.to_string(),
            max_connections: None,
        },
        destination: DestinationSettings {
            admin_endpoint: store_endpoint.clone(),
            app_endpoint: store_endpoint
                .with_credentials(Credentials::new(
                    principal.username.clone(),
                    principal.password.clone(),
                ))
                .with_database(database),
            database: database.to_string(),
            collection: "Queries".to_string(),
            principal,
        },
        query: MONITORED_QUERY.to_string(),
        iterations: Iterations::Fixed(iterations),
        interval: Duration::from_millis(50),
        retry: RetrySettings::fixed(3, Duration::from_millis(500)),
    }
}

/// Settings for a fresh destination database on running containers
pub async fn test_settings(prefix: &str, iterations: u64) -> anyhow::Result<Settings> {
    let source = mysql_container().await?;
    let store = mongo_container().await?;
    Ok(settings_for(&source, &store, &unique_database(prefix), iterations))
}
