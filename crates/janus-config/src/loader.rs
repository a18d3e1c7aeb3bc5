//! Layered configuration loading.
//!
//! Layers apply in order, later ones overriding earlier ones:
//! 1. Built-in defaults (or a preset)
//! 2. A TOML or JSON file
//! 3. Environment variables named `PREFIX__SECTION__KEY`

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::schema::LogFormat;
use crate::{ConfigError, JanusConfig};

/// Default environment prefix.
pub const DEFAULT_ENV_PREFIX: &str = "JANUS";

/// Builds a [`JanusConfig`] from defaults, files and the environment.
///
/// # Example
///
/// ```no_run
/// use janus_config::ConfigLoader;
///
/// # fn main() -> Result<(), janus_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("janus.toml")?
///     .with_env_prefix("JANUS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: JanusConfig,
    env_prefix: Option<String>,
    env_source: Option<HashMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: JanusConfig::default(),
            env_prefix: None,
            env_source: None,
        }
    }

    /// Starts from the development preset.
    ///
    /// ```
    /// use janus_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = JanusConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = JanusConfig::production();
        self
    }

    /// Loads a configuration file, choosing the parser from the extension.
    ///
    /// Sections present in the file replace the current ones; fields missing
    /// from a section take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, malformed, carries unknown
    /// fields, or has an extension other than `.toml` or `.json`.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        self.config = match extension.as_deref() {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration file format: {}",
                    path.display()
                )))
            }
        };

        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in the given format (`toml` or `json`).
    ///
    /// ```
    /// use janus_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    ///
    /// # Errors
    ///
    /// Fails on malformed content or an unsupported format.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Enables environment overrides under `prefix`.
    ///
    /// With prefix `JANUS`, `JANUS__SERVER__HTTP_ADDR=0.0.0.0:9000` overrides
    /// `server.http_addr` and `JANUS__TELEMETRY__LOGGING__LEVEL=debug`
    /// overrides `telemetry.logging.level`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_source<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_source = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Loads `.env` into the process environment. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Fails if `.env` exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies environment overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable or unknown override, or on validation.
    pub fn load(self) -> Result<JanusConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable or unknown override.
    pub fn load_unvalidated(mut self) -> Result<JanusConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            let vars: Vec<(String, String)> = match self.env_source.take() {
                Some(source) => source.into_iter().collect(),
                None => env::vars().collect(),
            };
            let mut overrides: Vec<_> = vars
                .into_iter()
                .filter(|(k, _)| k.starts_with(&marker))
                .collect();
            overrides.sort();

            for (key, value) in overrides {
                apply_env_var(&mut self.config, &key, &value, &marker)?;
            }
        }
        Ok(self.config)
    }
}

fn apply_env_var(
    config: &mut JanusConfig,
    key: &str,
    value: &str,
    marker: &str,
) -> Result<(), ConfigError> {
    let path = key
        .strip_prefix(marker)
        .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;
    let parts: Vec<&str> = path.split("__").collect();

    match parts.as_slice() {
        ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
        ["SERVER", "RPC_ADDR"] => config.server.rpc_addr = optional(value),
        ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
            config.server.shutdown_timeout_secs = parse(key, value, "expected integer")?;
        }
        ["SERVER", "REQUEST_TIMEOUT_MS"] => {
            config.server.request_timeout_ms = parse(key, value, "expected integer")?;
        }

        ["NAMING", "ENABLED"] => config.naming.enabled = parse_bool(key, value)?,
        ["NAMING", "SERVICE_NAME"] => config.naming.service_name = optional(value),
        ["NAMING", "ADVERTISE_ADDR"] => config.naming.advertise_addr = optional(value),
        ["NAMING", "TTL_SECS"] => {
            config.naming.ttl_secs = parse(key, value, "expected integer")?;
        }
        ["NAMING", "TIMEOUT_MS"] => {
            config.naming.timeout_ms = parse(key, value, "expected integer")?;
        }

        ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
        ["TELEMETRY", "SERVICE_VERSION"] => config.telemetry.service_version = value.to_string(),
        ["TELEMETRY", "ENVIRONMENT"] => config.telemetry.environment = value.to_string(),

        ["TELEMETRY", "METRICS", "ENABLED"] => {
            config.telemetry.metrics.enabled = parse_bool(key, value)?;
        }
        ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = optional(value),

        ["TELEMETRY", "TRACING", "ENABLED"] => {
            config.telemetry.tracing.enabled = parse_bool(key, value)?;
        }
        ["TELEMETRY", "TRACING", "OTLP_ENDPOINT"] => {
            config.telemetry.tracing.otlp_endpoint = optional(value);
        }
        ["TELEMETRY", "TRACING", "SAMPLING_RATIO"] => {
            config.telemetry.tracing.sampling_ratio = parse(key, value, "expected float")?;
        }

        ["TELEMETRY", "LOGGING", "ENABLED"] => {
            config.telemetry.logging.enabled = parse_bool(key, value)?;
        }
        ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
        ["TELEMETRY", "LOGGING", "FORMAT"] => {
            config.telemetry.logging.format = match value.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                "compact" => LogFormat::Compact,
                _ => {
                    return Err(ConfigError::env_parse_error(
                        key,
                        "expected 'json', 'pretty' or 'compact'",
                    ))
                }
            };
        }
        ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
            config.telemetry.logging.ansi_enabled = parse_bool(key, value)?;
        }
        ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
            config.telemetry.logging.include_location = parse_bool(key, value)?;
        }

        _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
    }

    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, expected))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}

// Empty string clears an optional value.
fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
