//! Load config from a flat option map, a JSON document, or the environment.

use crate::config::types::*;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

/// Leading `/`, no trailing `/`; `""` and `"/"` mount at the root.
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl BackendConfig {
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let defaults = BackendConfig::default();
        let database = raw.database.unwrap_or_default();
        if database.trim().is_empty() {
            return Err(ConfigError::Missing("mysql.database"));
        }
        Ok(BackendConfig {
            mysql: MySqlSettings {
                host: raw.host.unwrap_or(defaults.mysql.host),
                port: raw.port.unwrap_or(defaults.mysql.port),
                user: raw.user.unwrap_or(defaults.mysql.user),
                password: raw.password.unwrap_or(defaults.mysql.password),
                database,
            },
            base_path: normalize_base_path(raw.path.as_deref().unwrap_or(DEFAULT_BASE_PATH)),
            ansi_quotes: raw.ansi_quotes.unwrap_or(defaults.ansi_quotes),
            schema_wait_timeout: raw.schema_wait_timeout_ms.map(Duration::from_millis),
            body_limit: raw.body_limit.unwrap_or(defaults.body_limit),
        })
    }

    /// Recognized keys: `mysql.host`, `mysql.port`, `mysql.user`, `mysql.password`,
    /// `mysql.database`, `path`, `ansi_quotes`, `schema_wait_timeout_ms`, `body_limit`.
    /// Unrecognized keys are ignored.
    pub fn from_flat_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |k: &str| map.get(k).cloned();
        let raw = RawConfig {
            host: get("mysql.host"),
            port: get("mysql.port").map(|v| parse("mysql.port", &v)).transpose()?,
            user: get("mysql.user"),
            password: get("mysql.password"),
            database: get("mysql.database"),
            path: get("path"),
            ansi_quotes: get("ansi_quotes").map(|v| parse_bool("ansi_quotes", &v)).transpose()?,
            schema_wait_timeout_ms: get("schema_wait_timeout_ms")
                .map(|v| parse("schema_wait_timeout_ms", &v))
                .transpose()?,
            body_limit: get("body_limit").map(|v| parse("body_limit", &v)).transpose()?,
        };
        Self::from_raw(raw)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Read `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_USER`, `MYSQL_PASSWORD`, `MYSQL_DATABASE`,
    /// `API_BASE_PATH`, `MYSQL_ANSI_QUOTES`, `SCHEMA_WAIT_TIMEOUT_MS`, `BODY_LIMIT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        const VARS: &[(&str, &str)] = &[
            ("MYSQL_HOST", "mysql.host"),
            ("MYSQL_PORT", "mysql.port"),
            ("MYSQL_USER", "mysql.user"),
            ("MYSQL_PASSWORD", "mysql.password"),
            ("MYSQL_DATABASE", "mysql.database"),
            ("API_BASE_PATH", "path"),
            ("MYSQL_ANSI_QUOTES", "ansi_quotes"),
            ("SCHEMA_WAIT_TIMEOUT_MS", "schema_wait_timeout_ms"),
            ("BODY_LIMIT", "body_limit"),
        ];
        let map: HashMap<String, String> = VARS
            .iter()
            .filter_map(|(var, key)| std::env::var(var).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self::from_flat_map(&map)
    }
}
