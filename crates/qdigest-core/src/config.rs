//! Typed pipeline configuration
//!
//! [`DigestConfig`] is the partial form read from a TOML file and then
//! overridden from the environment through [`ENV_OVERRIDES`]. Calling
//! [`DigestConfig::resolve`] checks every required value at once and yields
//! the [`Settings`] the pipeline runs with.

use crate::{ConfigError, Credentials, Endpoint, Principal, Protocol};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SCHEMA: &str = "employees";
pub const DEFAULT_COLLECTION: &str = "Queries";
pub const DEFAULT_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 15_000;
pub const DEFAULT_SOCKET: &str = "/var/run/mysqld/mysqld.sock";

/// Source (MySQL) section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// `tcp` (default) or `unix`; over `unix` the socket path replaces host and port
    pub protocol: Option<Protocol>,
    /// Control socket checked as a secondary liveness signal
    pub socket: Option<PathBuf>,
    /// Schema the monitored query and digest lookup run against
    pub schema: Option<String>,
    pub max_connections: Option<u32>,
}

/// Destination (document store) section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DestinationConfig {
    /// `host:port`
    pub address: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub collection: Option<String>,
}

/// Run section: what to sample and how often
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    pub query: Option<String>,
    pub iterations: Option<u64>,
    pub interval_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    /// Cap for exponential backoff; unset or equal to `retry_backoff_ms` keeps it fixed
    pub retry_backoff_max_ms: Option<u64>,
    pub retry_jitter: Option<bool>,
}

/// Configuration as loaded, before required values are checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DigestConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub run: RunConfig,
}

type Setter = fn(&mut DigestConfig, &str, &str) -> Result<(), ConfigError>;

/// Recognized environment variables and the field each one sets
pub const ENV_OVERRIDES: &[(&str, Setter)] = &[
    ("MYSQL_USER", |c, _, v| set_string(&mut c.source.user, v)),
    ("MYSQL_PASSWORD", |c, _, v| set_string(&mut c.source.password, v)),
    ("MYSQL_HOST", |c, _, v| set_string(&mut c.source.host, v)),
    ("MYSQL_PORT", |c, k, v| set_parsed(&mut c.source.port, k, v)),
    ("MYSQL_PROTOCOL", |c, k, v| set_parsed(&mut c.source.protocol, k, v)),
    ("MYSQL_SOCKET", |c, _, v| {
        c.source.socket = Some(PathBuf::from(v));
        Ok(())
    }),
    ("MYSQL_SCHEMA", |c, _, v| set_string(&mut c.source.schema, v)),
    ("MYSQL_MAX_CONNECTIONS", |c, k, v| {
        set_parsed(&mut c.source.max_connections, k, v)
    }),
    ("STORE_ADDRESS", |c, _, v| set_string(&mut c.destination.address, v)),
    ("STORE_DATABASE", |c, _, v| set_string(&mut c.destination.database, v)),
    ("STORE_USERNAME", |c, _, v| set_string(&mut c.destination.username, v)),
    ("STORE_PASSWORD", |c, _, v| set_string(&mut c.destination.password, v)),
    ("STORE_ADMIN_USERNAME", |c, _, v| {
        set_string(&mut c.destination.admin_username, v)
    }),
    ("STORE_ADMIN_PASSWORD", |c, _, v| {
        set_string(&mut c.destination.admin_password, v)
    }),
    ("STORE_COLLECTION", |c, _, v| set_string(&mut c.destination.collection, v)),
    ("DIGEST_QUERY", |c, _, v| set_string(&mut c.run.query, v)),
    ("DIGEST_ITERATIONS", |c, k, v| set_parsed(&mut c.run.iterations, k, v)),
    ("DIGEST_INTERVAL_MS", |c, k, v| set_parsed(&mut c.run.interval_ms, k, v)),
    ("DIGEST_MAX_RETRIES", |c, k, v| set_parsed(&mut c.run.max_retries, k, v)),
    ("DIGEST_RETRY_BACKOFF_MS", |c, k, v| {
        set_parsed(&mut c.run.retry_backoff_ms, k, v)
    }),
    ("DIGEST_RETRY_BACKOFF_MAX_MS", |c, k, v| {
        set_parsed(&mut c.run.retry_backoff_max_ms, k, v)
    }),
    ("DIGEST_RETRY_JITTER", |c, k, v| set_parsed(&mut c.run.retry_jitter, k, v)),
];

fn set_string(field: &mut Option<String>, value: &str) -> Result<(), ConfigError> {
    *field = Some(value.to_string());
    Ok(())
}

fn set_parsed<T>(field: &mut Option<T>, key: &str, value: &str) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    *field = Some(parsed);
    Ok(())
}

impl DigestConfig {
    /// Read a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from a variable lookup. Only variables listed in
    /// [`ENV_OVERRIDES`] are consulted.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, setter) in ENV_OVERRIDES {
            if let Some(value) = lookup(key) {
                setter(self, key, &value)?;
            }
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Check required values and build the run settings
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let mut missing = Vec::new();

        let protocol = self.source.protocol.unwrap_or_default();
        let source_user = required(&self.source.user, "MYSQL_USER", &mut missing);
        let source_password = required(&self.source.password, "MYSQL_PASSWORD", &mut missing);
        // Host and port only matter over TCP
        let (source_host, source_port) = match protocol {
            Protocol::Tcp => {
                let host = required(&self.source.host, "MYSQL_HOST", &mut missing);
                if self.source.port.is_none() {
                    missing.push("MYSQL_PORT".to_string());
                }
                (host, self.source.port)
            }
            Protocol::Unix => (Some(""), Some(0)),
        };
        let address = required(&self.destination.address, "STORE_ADDRESS", &mut missing);
        let database = required(&self.destination.database, "STORE_DATABASE", &mut missing);
        let username = required(&self.destination.username, "STORE_USERNAME", &mut missing);
        let password = required(&self.destination.password, "STORE_PASSWORD", &mut missing);
        let query = required(&self.run.query, "DIGEST_QUERY", &mut missing);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        // All of the above are Some once `missing` is empty.
        let (
            Some(source_user),
            Some(source_password),
            Some(source_host),
            Some(source_port),
            Some(address),
            Some(database),
            Some(username),
            Some(password),
            Some(query),
        ) = (
            source_user,
            source_password,
            source_host,
            source_port,
            address,
            database,
            username,
            password,
            query,
        )
        else {
            return Err(ConfigError::Missing(Vec::new()));
        };

        let schema = non_empty(&self.source.schema).unwrap_or(DEFAULT_SCHEMA);
        let socket = self
            .source
            .socket
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET));
        let source_endpoint = match protocol {
            Protocol::Tcp => Endpoint::tcp(source_host, source_port),
            Protocol::Unix => Endpoint::unix(socket.display().to_string()),
        };
        let source_endpoint = source_endpoint
            .with_credentials(Credentials::new(source_user, source_password))
            .with_database(schema);

        let store = Endpoint::parse_address(address).map_err(|reason| ConfigError::Invalid {
            key: "STORE_ADDRESS".to_string(),
            value: address.to_string(),
            reason,
        })?;
        let admin_endpoint = match (
            non_empty(&self.destination.admin_username),
            non_empty(&self.destination.admin_password),
        ) {
            (Some(user), Some(pass)) => store
                .clone()
                .with_credentials(Credentials::new(user, pass)),
            (None, None) => store.clone(),
            (Some(_), None) => {
                return Err(ConfigError::Missing(vec!["STORE_ADMIN_PASSWORD".to_string()]));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Missing(vec!["STORE_ADMIN_USERNAME".to_string()]));
            }
        };
        let app_endpoint = store
            .with_credentials(Credentials::new(username, password))
            .with_database(database);

        Ok(Settings {
            source: SourceSettings {
                endpoint: source_endpoint,
                socket,
                schema: schema.to_string(),
                max_connections: self.source.max_connections,
            },
            destination: DestinationSettings {
                admin_endpoint,
                app_endpoint,
                database: database.to_string(),
                collection: non_empty(&self.destination.collection)
                    .unwrap_or(DEFAULT_COLLECTION)
                    .to_string(),
                principal: Principal::new(username, password),
            },
            query: query.trim().to_string(),
            iterations: match self.run.iterations {
                Some(n) => Iterations::Fixed(n),
                None => Iterations::UntilCancelled,
            },
            interval: Duration::from_millis(self.run.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS)),
            retry: self.retry_settings()?,
        })
    }
}

impl DigestConfig {
    fn retry_settings(&self) -> Result<RetrySettings, ConfigError> {
        let backoff_ms = self.run.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS);
        let backoff_max_ms = self.run.retry_backoff_max_ms.unwrap_or(backoff_ms);
        if backoff_max_ms < backoff_ms {
            return Err(ConfigError::Invalid {
                key: "DIGEST_RETRY_BACKOFF_MAX_MS".to_string(),
                value: backoff_max_ms.to_string(),
                reason: format!("must be at least DIGEST_RETRY_BACKOFF_MS ({})", backoff_ms),
            });
        }
        Ok(RetrySettings {
            max_retries: self.run.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            backoff: Duration::from_millis(backoff_ms),
            backoff_max: Duration::from_millis(backoff_max_ms),
            jitter: self.run.retry_jitter.unwrap_or(false),
        })
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(
    field: &'a Option<String>,
    key: &str,
    missing: &mut Vec<String>,
) -> Option<&'a str> {
    let value = non_empty(field);
    if value.is_none() {
        missing.push(key.to_string());
    }
    value
}

/// How many sampling iterations a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iterations {
    Fixed(u64),
    UntilCancelled,
}

impl Iterations {
    /// Whether iteration `completed + 1` should run
    pub fn allows(&self, completed: u64) -> bool {
        match self {
            Iterations::Fixed(n) => completed < *n,
            Iterations::UntilCancelled => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub endpoint: Endpoint,
    /// Checked for presence after every connect
    pub socket: PathBuf,
    pub schema: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSettings {
    /// Privileged endpoint used for provisioning
    pub admin_endpoint: Endpoint,
    /// Endpoint authenticated as the service principal
    pub app_endpoint: Endpoint,
    pub database: String,
    pub collection: String,
    pub principal: Principal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_retries: u32,
    /// Wait before the first retry
    pub backoff: Duration,
    /// Doubling stops here; equal to `backoff` for a fixed interval
    pub backoff_max: Duration,
    pub jitter: bool,
}

impl RetrySettings {
    /// A fixed interval between retries
    pub fn fixed(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
            backoff_max: backoff,
            jitter: false,
        }
    }

    pub fn is_exponential(&self) -> bool {
        self.backoff_max > self.backoff
    }
}

/// Fully resolved settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source: SourceSettings,
    pub destination: DestinationSettings,
    pub query: String,
    pub iterations: Iterations,
    pub interval: Duration,
    pub retry: RetrySettings,
}

#[cfg(test)]
mod tests;
