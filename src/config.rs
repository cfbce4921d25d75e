//! Configuration handling for the internal store.
//!
//! All settings are read once at startup from CLI arguments or environment
//! variables. Pool tuning knobs travel as query parameters on the datasource
//! URL and are stripped before the URL is handed to the driver.

use crate::error::{StoreError, StoreResult};
use crate::models::ConnectionParams;
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENTITY_SET: &str = "internal";
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool configuration options parsed from the datasource URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10 for MySQL/PostgreSQL, 1 for SQLite)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    /// Pool option keys recognized in URL query parameters.
    const KEYS: &'static [&'static str] = &[
        "max_connections",
        "min_connections",
        "idle_timeout",
        "acquire_timeout",
        "test_before_acquire",
    ];

    /// Get max_connections with default value based on database type.
    pub fn max_connections_or_default(&self, is_sqlite: bool) -> u32 {
        self.max_connections.unwrap_or(if is_sqlite {
            DEFAULT_MAX_CONNECTIONS_SQLITE
        } else {
            DEFAULT_MAX_CONNECTIONS
        })
    }

    /// Get min_connections with default value.
    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(
            self.acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        )
    }

    /// Get test_before_acquire with default value.
    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let Some(min) = self.min_connections {
            if min == 0 {
                return Err("min_connections must be greater than 0".to_string());
            }
            if let Some(max) = self.max_connections {
                if min > max {
                    return Err(format!(
                        "min_connections ({}) cannot exceed max_connections ({})",
                        min, max
                    ));
                }
            }
        }
        Ok(())
    }

    /// Split a datasource URL into the driver-facing URL and the pool options
    /// carried in its query string.
    pub fn split_from_url(raw: &str) -> Result<(String, PoolOptions), String> {
        let mut url = Url::parse(raw).map_err(|e| format!("Invalid URL: {e}"))?;
        if url.query().is_none() {
            return Ok((raw.to_string(), PoolOptions::default()));
        }

        let mut opts = extract_options(&mut url, Self::KEYS);
        let options = PoolOptions {
            max_connections: opts.remove("max_connections").and_then(|v| v.parse().ok()),
            min_connections: opts.remove("min_connections").and_then(|v| v.parse().ok()),
            idle_timeout_secs: opts.remove("idle_timeout").and_then(|v| v.parse().ok()),
            acquire_timeout_secs: opts.remove("acquire_timeout").and_then(|v| v.parse().ok()),
            test_before_acquire: opts.remove("test_before_acquire").and_then(|v| {
                if v.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if v.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None // Invalid value ignored
                }
            }),
        };
        options.validate()?;

        Ok((url.to_string(), options))
    }
}

/// Extract pool options from URL query params, keeping others for the driver.
fn extract_options(url: &mut Url, keys: &[&str]) -> HashMap<String, String> {
    let mut opts = HashMap::new();
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            let key_lower = k.to_ascii_lowercase();
            if keys.contains(&key_lower.as_str()) {
                opts.insert(key_lower, v.into_owned());
                None
            } else {
                Some((k.into_owned(), v.into_owned()))
            }
        })
        .collect();

    if remaining.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(remaining);
    }
    opts
}

/// Declarative policy for reconciling the live schema with declared entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaMode {
    /// Fail at startup if the live schema disagrees with the entities
    Validate,
    /// Create missing tables and columns, never drop anything
    #[default]
    Update,
    /// Drop and recreate every declared table
    Create,
    /// Like create, and drop the tables again on shutdown
    CreateDrop,
}

impl SchemaMode {
    /// True when startup wipes existing tables.
    pub fn recreates_tables(&self) -> bool {
        matches!(self, Self::Create | Self::CreateDrop)
    }

    /// True when shutdown drops the declared tables.
    pub fn drops_on_shutdown(&self) -> bool {
        matches!(self, Self::CreateDrop)
    }
}

impl std::fmt::Display for SchemaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Update => write!(f, "update"),
            Self::Create => write!(f, "create"),
            Self::CreateDrop => write!(f, "create-drop"),
        }
    }
}

/// Configuration for the internal store.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "snapadmin-store",
    about = "Private datastore for SnapAdmin settings and operations history",
    version,
    author
)]
pub struct Config {
    /// Activate the internal store. When off, nothing is constructed.
    #[arg(long = "snapadmin-enabled", env = "SNAPADMIN_ENABLED")]
    pub enabled: bool,

    /// Driver identifier: sqlite, postgres or mysql
    #[arg(
        long = "internal-datasource-driver-class-name",
        value_name = "DRIVER",
        env = "INTERNAL_DATASOURCE_DRIVER_CLASS_NAME"
    )]
    pub driver_class_name: Option<String>,

    /// Internal datasource URL. Pool options may be passed as query parameters.
    #[arg(
        long = "internal-datasource-url",
        value_name = "URL",
        env = "INTERNAL_DATASOURCE_URL"
    )]
    pub url: Option<String>,

    #[arg(
        long = "internal-datasource-username",
        env = "INTERNAL_DATASOURCE_USERNAME"
    )]
    pub username: Option<String>,

    #[arg(
        long = "internal-datasource-password",
        env = "INTERNAL_DATASOURCE_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// Dialect hint; must match the engine behind the URL. Derived from the driver when omitted.
    #[arg(
        long = "internal-datasource-hibernate-dialect",
        alias = "internal-datasource-dialect",
        env = "INTERNAL_DATASOURCE_HIBERNATE_DIALECT"
    )]
    pub dialect: Option<String>,

    /// Schema management mode
    #[arg(
        long = "internal-datasource-hbm2ddl-auto",
        alias = "internal-datasource-schema-mode",
        value_enum,
        default_value = "update",
        env = "INTERNAL_DATASOURCE_HBM2DDL_AUTO"
    )]
    pub schema_mode: SchemaMode,

    /// Named entity set managed by the store
    #[arg(
        long = "internal-entity-set",
        default_value = DEFAULT_ENTITY_SET,
        env = "INTERNAL_ENTITY_SET"
    )]
    pub entity_set: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "SNAPADMIN_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "SNAPADMIN_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            enabled: false,
            driver_class_name: None,
            url: None,
            username: None,
            password: None,
            dialect: None,
            schema_mode: SchemaMode::default(),
            entity_set: DEFAULT_ENTITY_SET.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }

    /// Build the connection parameters and pool options for the datasource.
    ///
    /// Presence checks are left to the connection provider; this only splits
    /// pool options off the URL.
    pub fn datasource(&self) -> StoreResult<(ConnectionParams, PoolOptions)> {
        let (url, pool_options) = match self.url.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let (url, opts) = PoolOptions::split_from_url(raw).map_err(|e| {
                    StoreError::configuration(
                        format!("Invalid internal datasource URL: {}", e),
                        "Use a URL such as sqlite:snapadmin_internal.db or postgres://host/db",
                    )
                })?;
                (Some(url), opts)
            }
            other => (other.map(String::from), PoolOptions::default()),
        };

        let params = ConnectionParams {
            driver: self.driver_class_name.clone(),
            url,
            username: self.username.clone(),
            password: self.password.clone(),
        };
        Ok((params, pool_options))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_disabled() {
        let config = Config::default();
        assert!(!config.enabled);
        assert_eq!(config.schema_mode, SchemaMode::Update);
        assert_eq!(config.entity_set, DEFAULT_ENTITY_SET);
    }

    #[test]
    fn test_parse_property_style_flags() {
        let config = Config::try_parse_from([
            "snapadmin-store",
            "--snapadmin-enabled",
            "--internal-datasource-driver-class-name",
            "sqlite",
            "--internal-datasource-url",
            "sqlite:internal.db",
            "--internal-datasource-username",
            "sa",
            "--internal-datasource-password",
            "",
            "--internal-datasource-hbm2ddl-auto",
            "create-drop",
        ])
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.driver_class_name.as_deref(), Some("sqlite"));
        assert_eq!(config.password.as_deref(), Some(""));
        assert_eq!(config.schema_mode, SchemaMode::CreateDrop);
    }

    #[test]
    fn test_schema_mode_display() {
        assert_eq!(SchemaMode::Validate.to_string(), "validate");
        assert_eq!(SchemaMode::CreateDrop.to_string(), "create-drop");
        assert!(SchemaMode::Create.recreates_tables());
        assert!(!SchemaMode::Update.recreates_tables());
        assert!(SchemaMode::CreateDrop.drops_on_shutdown());
        assert!(!SchemaMode::Create.drops_on_shutdown());
    }

    #[test]
    fn test_invalid_schema_mode_rejected() {
        let result = Config::try_parse_from([
            "snapadmin-store",
            "--internal-datasource-hbm2ddl-auto",
            "drop-everything",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_datasource_without_url() {
        let config = Config::default();
        let (params, opts) = config.datasource().unwrap();
        assert!(params.url.is_none());
        assert_eq!(opts, PoolOptions::default());
    }

    #[test]
    fn test_datasource_strips_pool_options() {
        let config = Config {
            url: Some("postgres://host/admin?max_connections=4&sslmode=require".to_string()),
            ..Config::default()
        };
        let (params, opts) = config.datasource().unwrap();
        let url = params.url.unwrap();
        assert_eq!(opts.max_connections, Some(4));
        assert!(url.contains("sslmode=require"));
        assert!(!url.contains("max_connections"));
    }

    #[test]
    fn test_datasource_invalid_url_is_configuration_error() {
        let config = Config {
            url: Some("not a url".to_string()),
            ..Config::default()
        };
        let err = config.datasource().unwrap_err();
        assert!(matches!(err, StoreError::Configuration { .. }));
    }

    // =========================================================================
    // Pool Options Tests
    // =========================================================================

    #[test]
    fn test_pool_options_defaults() {
        let opts = PoolOptions::default();
        assert_eq!(opts.max_connections_or_default(false), 10);
        assert_eq!(opts.max_connections_or_default(true), 1);
        assert_eq!(opts.min_connections_or_default(), 1);
        assert_eq!(opts.idle_timeout(), Duration::from_secs(600));
        assert_eq!(opts.acquire_timeout(), Duration::from_secs(30));
        assert!(opts.test_before_acquire_or_default());
    }

    #[test]
    fn test_url_without_query_is_untouched() {
        let (url, opts) = PoolOptions::split_from_url("sqlite:snapadmin_internal.db").unwrap();
        assert_eq!(url, "sqlite:snapadmin_internal.db");
        assert_eq!(opts, PoolOptions::default());
    }

    #[test]
    fn test_parse_pool_options_from_url() {
        let (url, opts) = PoolOptions::split_from_url(
            "mysql://host/db?max_connections=20&min_connections=5&idle_timeout=300&charset=utf8",
        )
        .unwrap();
        assert_eq!(opts.max_connections, Some(20));
        assert_eq!(opts.min_connections, Some(5));
        assert_eq!(opts.idle_timeout_secs, Some(300));
        assert!(opts.acquire_timeout_secs.is_none());
        assert_eq!(url, "mysql://host/db?charset=utf8");
    }

    #[test]
    fn test_pool_options_invalid_boolean_ignored() {
        let (_, opts) =
            PoolOptions::split_from_url("mysql://host/db?test_before_acquire=garbage").unwrap();
        assert!(opts.test_before_acquire.is_none());
    }

    #[test]
    fn test_pool_options_validation_max_zero() {
        let result = PoolOptions::split_from_url("mysql://host/db?max_connections=0");
        assert!(result.unwrap_err().contains("max_connections"));
    }

    #[test]
    fn test_pool_options_validation_min_exceeds_max() {
        let result =
            PoolOptions::split_from_url("mysql://host/db?min_connections=10&max_connections=5");
        assert!(result.unwrap_err().contains("cannot exceed"));
    }
}
