//! Config types. Flat JSON keys use the dotted option names (`mysql.host`, ...).

use serde::Deserialize;
use std::time::Duration;

/// Fixed upper bound of concurrently open connections.
pub const POOL_SIZE: u32 = 100;

pub const DEFAULT_BASE_PATH: &str = "/api";
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for MySqlSettings {
    fn default() -> Self {
        MySqlSettings {
            host: "localhost".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            database: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    pub mysql: MySqlSettings,
    /// Mount point of the table routes: leading `/`, no trailing `/`, empty for root.
    pub base_path: String,
    /// Quote identifiers with `"` and enable `ANSI_QUOTES` on every connection.
    pub ansi_quotes: bool,
    /// Upper bound on how long a request waits for its table's columns. `None` waits indefinitely.
    pub schema_wait_timeout: Option<Duration>,
    pub body_limit: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            mysql: MySqlSettings::default(),
            base_path: DEFAULT_BASE_PATH.into(),
            ansi_quotes: true,
            schema_wait_timeout: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Flat JSON form of [`BackendConfig`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "mysql.host", default)]
    pub host: Option<String>,
    #[serde(rename = "mysql.port", default)]
    pub port: Option<u16>,
    #[serde(rename = "mysql.user", default)]
    pub user: Option<String>,
    #[serde(rename = "mysql.password", default)]
    pub password: Option<String>,
    #[serde(rename = "mysql.database", default)]
    pub database: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub ansi_quotes: Option<bool>,
    #[serde(default)]
    pub schema_wait_timeout_ms: Option<u64>,
    #[serde(default)]
    pub body_limit: Option<usize>,
}
