//! Tests for configuration loading and resolution

use super::*;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::io::Write;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn complete_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("MYSQL_USER", "digest"),
        ("MYSQL_PASSWORD", "secret"),
        ("MYSQL_HOST", "127.0.0.1"),
        ("MYSQL_PORT", "3306"),
        ("STORE_ADDRESS", "localhost:27017"),
        ("STORE_DATABASE", "QueryDigest"),
        ("STORE_USERNAME", "harvester"),
        ("STORE_PASSWORD", "hunter2"),
        ("DIGEST_QUERY", "SELECT * FROM employees WHERE emp_no = 10001"),
    ]
}

#[test]
fn test_resolve_with_defaults() {
    let mut config = DigestConfig::default();
    config.apply_env(env(&complete_env())).unwrap();
    let settings = config.resolve().unwrap();

    assert_eq!(settings.source.schema, DEFAULT_SCHEMA);
    assert_eq!(settings.source.endpoint.host(), "127.0.0.1");
    assert_eq!(settings.source.endpoint.port(), 3306);
    assert_eq!(settings.source.endpoint.database(), Some("employees"));
    assert_eq!(settings.source.max_connections, None);
    assert_eq!(settings.destination.collection, DEFAULT_COLLECTION);
    assert_eq!(settings.destination.database, "QueryDigest");
    assert_eq!(settings.destination.principal, Principal::new("harvester", "hunter2"));
    assert!(settings.destination.admin_endpoint.credentials().is_none());
    assert_eq!(settings.iterations, Iterations::UntilCancelled);
    assert_eq!(settings.interval, Duration::from_millis(DEFAULT_INTERVAL_MS));
    assert_eq!(settings.retry.max_retries, DEFAULT_MAX_RETRIES);
    assert_eq!(settings.retry.backoff, Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS));
    assert!(!settings.retry.is_exponential());
    assert!(!settings.retry.jitter);
    assert_eq!(settings.source.socket, PathBuf::from(DEFAULT_SOCKET));
    assert_eq!(settings.source.endpoint.protocol(), Protocol::Tcp);
}

#[test]
fn test_socket_override_replaces_default() {
    let mut pairs = complete_env();
    pairs.push(("MYSQL_SOCKET", "/tmp/mysql.sock"));
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();

    let settings = config.resolve().unwrap();
    assert_eq!(settings.source.socket, PathBuf::from("/tmp/mysql.sock"));
}

#[test]
fn test_unix_protocol_connects_through_socket() {
    let pairs = vec![
        ("MYSQL_PROTOCOL", "unix"),
        ("MYSQL_SOCKET", "/run/mysqld/mysqld.sock"),
        ("MYSQL_USER", "digest"),
        ("MYSQL_PASSWORD", "secret"),
        ("STORE_ADDRESS", "localhost:27017"),
        ("STORE_DATABASE", "QueryDigest"),
        ("STORE_USERNAME", "harvester"),
        ("STORE_PASSWORD", "hunter2"),
        ("DIGEST_QUERY", "SELECT 1"),
    ];
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();

    // Host and port are not required over a socket
    let settings = config.resolve().unwrap();
    let endpoint = &settings.source.endpoint;
    assert_eq!(endpoint.protocol(), Protocol::Unix);
    assert_eq!(endpoint.host(), "/run/mysqld/mysqld.sock");
    assert_eq!(endpoint.database(), Some(DEFAULT_SCHEMA));
    assert_eq!(endpoint.credentials(), Some(&Credentials::new("digest", "secret")));
}

#[test]
fn test_unknown_protocol_is_invalid() {
    let mut config = DigestConfig::default();
    let err = config
        .apply_env(env(&[("MYSQL_PROTOCOL", "pipe")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "MYSQL_PROTOCOL"));
}

#[test]
fn test_exponential_backoff_settings() {
    let mut pairs = complete_env();
    pairs.push(("DIGEST_RETRY_BACKOFF_MS", "500"));
    pairs.push(("DIGEST_RETRY_BACKOFF_MAX_MS", "8000"));
    pairs.push(("DIGEST_RETRY_JITTER", "true"));
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();

    let retry = config.resolve().unwrap().retry;
    assert!(retry.is_exponential());
    assert!(retry.jitter);
    assert_eq!(retry.backoff, Duration::from_millis(500));
    assert_eq!(retry.backoff_max, Duration::from_millis(8000));
}

#[test]
fn test_backoff_cap_below_initial_is_invalid() {
    let mut pairs = complete_env();
    pairs.push(("DIGEST_RETRY_BACKOFF_MS", "5000"));
    pairs.push(("DIGEST_RETRY_BACKOFF_MAX_MS", "1000"));
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();

    assert!(matches!(
        config.resolve().unwrap_err(),
        ConfigError::Invalid { ref key, .. } if key == "DIGEST_RETRY_BACKOFF_MAX_MS"
    ));
}

#[test]
fn test_missing_values_reported_together() {
    let mut config = DigestConfig::default();
    config
        .apply_env(env(&[("MYSQL_USER", "digest"), ("MYSQL_HOST", "db")]))
        .unwrap();

    let err = config.resolve().unwrap_err();
    assert_eq!(
        err,
        ConfigError::Missing(vec![
            "MYSQL_PASSWORD".to_string(),
            "MYSQL_PORT".to_string(),
            "STORE_ADDRESS".to_string(),
            "STORE_DATABASE".to_string(),
            "STORE_USERNAME".to_string(),
            "STORE_PASSWORD".to_string(),
            "DIGEST_QUERY".to_string(),
        ])
    );
    assert!(err.to_string().contains("MYSQL_PASSWORD, MYSQL_PORT"));
}

#[test]
fn test_blank_value_counts_as_missing() {
    let mut pairs = complete_env();
    pairs.push(("DIGEST_QUERY", "   "));
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();

    assert_eq!(
        config.resolve().unwrap_err(),
        ConfigError::Missing(vec!["DIGEST_QUERY".to_string()])
    );
}

#[test]
fn test_unparseable_port_is_invalid() {
    let mut config = DigestConfig::default();
    let err = config
        .apply_env(env(&[("MYSQL_PORT", "not-a-port")]))
        .unwrap_err();

    assert!(matches!(
        err,
        ConfigError::Invalid { ref key, ref value, .. } if key == "MYSQL_PORT" && value == "not-a-port"
    ));
}

#[test]
fn test_bad_store_address_is_invalid() {
    let mut pairs = complete_env();
    pairs.push(("STORE_ADDRESS", "localhost"));
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();

    assert!(matches!(
        config.resolve().unwrap_err(),
        ConfigError::Invalid { ref key, .. } if key == "STORE_ADDRESS"
    ));
}

#[test]
fn test_max_connections_independent_of_iterations() {
    let mut pairs = complete_env();
    pairs.push(("DIGEST_ITERATIONS", "3"));
    pairs.push(("MYSQL_MAX_CONNECTIONS", "500"));
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();
    let settings = config.resolve().unwrap();

    assert_eq!(settings.iterations, Iterations::Fixed(3));
    assert_eq!(settings.source.max_connections, Some(500));
}

#[test]
fn test_admin_credentials_need_both_halves() {
    let mut pairs = complete_env();
    pairs.push(("STORE_ADMIN_USERNAME", "root"));
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();

    assert_eq!(
        config.resolve().unwrap_err(),
        ConfigError::Missing(vec!["STORE_ADMIN_PASSWORD".to_string()])
    );

    pairs.push(("STORE_ADMIN_PASSWORD", "example"));
    let mut config = DigestConfig::default();
    config.apply_env(env(&pairs)).unwrap();
    let settings = config.resolve().unwrap();
    assert_eq!(
        settings.destination.admin_endpoint.credentials(),
        Some(&Credentials::new("root", "example"))
    );
}

#[test]
fn test_env_overrides_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[source]
user = "file-user"
host = "db.internal"
port = 3307
schema = "sakila"

[run]
iterations = 5
interval_ms = 250
"#
    )
    .unwrap();

    let mut config = DigestConfig::from_file(file.path()).unwrap();
    assert_eq!(config.source.user.as_deref(), Some("file-user"));
    assert_eq!(config.source.port, Some(3307));
    assert_eq!(config.run.iterations, Some(5));

    config
        .apply_env(env(&[("MYSQL_USER", "env-user"), ("DIGEST_ITERATIONS", "2")]))
        .unwrap();
    assert_eq!(config.source.user.as_deref(), Some("env-user"));
    assert_eq!(config.source.host.as_deref(), Some("db.internal"));
    assert_eq!(config.source.schema.as_deref(), Some("sakila"));
    assert_eq!(config.run.iterations, Some(2));
    assert_eq!(config.run.interval_ms, Some(250));
}

#[test]
fn test_unparseable_file_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[source\nuser = ").unwrap();

    assert!(matches!(
        DigestConfig::from_file(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    assert!(matches!(
        DigestConfig::from_file(Path::new("/nonexistent/qdigest.toml")),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn test_iterations_allows() {
    assert!(Iterations::Fixed(2).allows(1));
    assert!(!Iterations::Fixed(2).allows(2));
    assert!(!Iterations::Fixed(0).allows(0));
    assert!(Iterations::UntilCancelled.allows(u64::MAX));
}
