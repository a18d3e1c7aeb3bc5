//! Loading configuration files from disk.

use std::io::Write;

use janus_config::{ConfigError, ConfigLoader, LogFormat};
use tempfile::NamedTempFile;

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_toml_file() {
    let file = temp_file(
        ".toml",
        r#"
        [server]
        http_addr = "127.0.0.1:8081"
        rpc_addr = "127.0.0.1:9091"

        [naming]
        enabled = true
        service_name = "hello"

        [telemetry.logging]
        format = "pretty"
        "#,
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.server.rpc_addr.as_deref(), Some("127.0.0.1:9091"));
    assert_eq!(config.registry_name(), "hello");
    assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    assert_eq!(config.telemetry.logging.level, "info");
}

#[test]
fn loads_json_file() {
    let file = temp_file(
        ".json",
        r#"{"telemetry": {"service_name": "json-service", "metrics": {"enabled": false}}}"#,
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.telemetry.service_name, "json-service");
    assert!(!config.telemetry.metrics.enabled);
}

#[test]
fn rejects_unknown_fields_in_file() {
    let file = temp_file(".toml", "[server]\nworkers = 4\n");

    let result = ConfigLoader::new().with_file(file.path());

    assert!(matches!(result, Err(ConfigError::TomlError(_))));
}

#[test]
fn rejects_unsupported_extension() {
    let file = temp_file(".yaml", "server: {}\n");

    let result = ConfigLoader::new().with_file(file.path());

    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn missing_file_is_an_error() {
    let result = ConfigLoader::new().with_file("/definitely/not/here/janus.toml");
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[test]
fn missing_optional_file_is_skipped() {
    let config = ConfigLoader::new()
        .with_optional_file("/definitely/not/here/janus.toml")
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(config.server.http_addr, "0.0.0.0:8080");
}

#[test]
fn file_then_env_then_validation() {
    let file = temp_file(".toml", "[server]\nhttp_addr = \"127.0.0.1:8082\"\n");

    let config = ConfigLoader::new()
        .with_file(file.path())
        .unwrap()
        .with_env_prefix("JANUS")
        .with_env_source([("JANUS__TELEMETRY__SERVICE_NAME", "from-env")])
        .load()
        .unwrap();

    assert_eq!(config.server.http_addr, "127.0.0.1:8082");
    assert_eq!(config.to_telemetry_config().service.name, "from-env");
}
