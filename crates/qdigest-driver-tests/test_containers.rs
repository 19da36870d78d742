//! Docker container management for integration tests.
//!
//! Containers are started lazily on first use and cached for the rest of the
//! test process:
//!
//! - MySQL, seeded with a small `employees` schema the monitored query runs against
//! - MongoDB, unauthenticated, as the destination store
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_containers::mysql_container;
//!
//! let info = mysql_container().await?;
//! let endpoint = info.endpoint();
//! ```

use once_cell::sync::Lazy;
use qdigest_core::{Connection, Credentials, DatabaseDriver, Endpoint};
use qdigest_driver_mysql::MySqlDriver;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::{mongo::Mongo, mysql::Mysql};

/// Schema the seed data lives in
pub const SOURCE_SCHEMA: &str = "employees";

/// Statements seeding the MySQL container
const MYSQL_SEED: &[&str] = &[
    "CREATE DATABASE IF NOT EXISTS employees",
    "CREATE TABLE IF NOT EXISTS employees.employees (
        emp_no INT NOT NULL,
        birth_date DATE NOT NULL,
        first_name VARCHAR(14) NOT NULL,
        last_name VARCHAR(16) NOT NULL,
        hire_date DATE NOT NULL,
        PRIMARY KEY (emp_no)
    )",
    "INSERT IGNORE INTO employees.employees VALUES
        (10001, '1953-09-02', 'Georgi', 'Facello', '1986-06-26'),
        (10002, '1964-06-02', 'Bezalel', 'Simmel', '1985-11-21'),
        (10003, '1959-12-03', 'Parto', 'Bamford', '1986-08-28')",
];

/// Information about a running test container
#[derive(Clone, Debug)]
pub struct ContainerInfo {
    /// Host address (typically 127.0.0.1)
    pub host: String,
    /// Port number (randomly assigned by testcontainers)
    pub port: u16,
    /// Username for authentication
    pub username: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
}

impl ContainerInfo {
    /// TCP endpoint carrying the container's credentials, if any
    pub fn endpoint(&self) -> Endpoint {
        let endpoint = Endpoint::tcp(self.host.clone(), self.port);
        match &self.username {
            Some(user) => endpoint.with_credentials(Credentials::new(
                user.clone(),
                self.password.clone().unwrap_or_default(),
            )),
            None => endpoint,
        }
    }
}

struct MysqlContainer {
    #[allow(dead_code)]
    inner: ContainerAsync<Mysql>,
    info: ContainerInfo,
}

struct MongoContainer {
    #[allow(dead_code)]
    inner: ContainerAsync<Mongo>,
    info: ContainerInfo,
}

static MYSQL_CONTAINER: Lazy<Arc<Mutex<Option<MysqlContainer>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

static MONGO_CONTAINER: Lazy<Arc<Mutex<Option<MongoContainer>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Seed the `employees` schema through the qdigest MySQL driver
async fn init_mysql_data(info: &ContainerInfo) -> anyhow::Result<()> {
    let driver = MySqlDriver::new(info.endpoint());

    let max_retries = 10;
    let mut conn = None;
    for attempt in 1..=max_retries {
        match driver.connect().await {
            Ok(c) => {
                conn = Some(c);
                break;
            }
            Err(e) if attempt < max_retries => {
                let delay = Duration::from_secs(2u64.pow(attempt.min(4)));
                tracing::warn!(
                    attempt = attempt,
                    delay_secs = delay.as_secs(),
                    "MySQL connection failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to connect to MySQL after {} attempts: {}",
                    max_retries,
                    e
                ));
            }
        }
    }
    let conn = conn.ok_or_else(|| anyhow::anyhow!("no MySQL connection"))?;

    for statement in MYSQL_SEED {
        conn.execute(statement, &[])
            .await
            .map_err(|e| anyhow::anyhow!("failed to seed MySQL: {}", e))?;
    }
    conn.close()
        .await
        .map_err(|e| anyhow::anyhow!("failed to close seed connection: {}", e))?;

    tracing::info!("MySQL container seeded");
    Ok(())
}

/// Get or create the MySQL test container
///
/// testcontainers-modules runs MySQL as `root` with an empty password.
pub async fn mysql_container() -> anyhow::Result<ContainerInfo> {
    {
        let guard = MYSQL_CONTAINER
            .lock()
            .map_err(|e| anyhow::anyhow!("failed to lock mysql container: {}", e))?;
        if let Some(ref container) = *guard {
            return Ok(container.info.clone());
        }
    }

    tracing::info!("starting MySQL test container");
    let container = Mysql::default()
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start mysql container: {}", e))?;
    let host_port = container
        .get_host_port_ipv4(3306)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get mysql port: {}", e))?;

    let info = ContainerInfo {
        host: "127.0.0.1".to_string(),
        port: host_port,
        username: Some("root".to_string()),
        password: None,
    };
    init_mysql_data(&info).await?;

    let mut guard = MYSQL_CONTAINER
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock mysql container: {}", e))?;
    *guard = Some(MysqlContainer {
        inner: container,
        info: info.clone(),
    });
    Ok(info)
}

/// Get or create the MongoDB test container
///
/// The server runs without access control, so the admin endpoint carries no
/// credentials while provisioned principals can still authenticate.
pub async fn mongo_container() -> anyhow::Result<ContainerInfo> {
    {
        let guard = MONGO_CONTAINER
            .lock()
            .map_err(|e| anyhow::anyhow!("failed to lock mongo container: {}", e))?;
        if let Some(ref container) = *guard {
            return Ok(container.info.clone());
        }
    }

    tracing::info!("starting MongoDB test container");
    let container = Mongo::default()
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start mongo container: {}", e))?;
    let host_port = container
        .get_host_port_ipv4(27017)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get mongo port: {}", e))?;

    let info = ContainerInfo {
        host: "127.0.0.1".to_string(),
        port: host_port,
        username: None,
        password: None,
    };

    let mut guard = MONGO_CONTAINER
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock mongo container: {}", e))?;
    *guard = Some(MongoContainer {
        inner: container,
        info: info.clone(),
    });
    Ok(info)
}
