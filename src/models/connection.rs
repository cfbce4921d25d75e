//! Connection-related data models.
//!
//! This module defines the database engines the internal store can run on and
//! the connection parameters read at startup.

use serde::{Deserialize, Serialize};
use url::Url;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Resolve a driver identifier. Only drivers compiled into the crate resolve.
    pub fn from_driver_name(driver: &str) -> Option<Self> {
        match driver.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "sqlite" | "sqlite3" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Resolve a dialect hint such as `sqlite`, `PostgreSQLDialect` or `MariaDB103Dialect`.
    pub fn from_dialect_hint(hint: &str) -> Option<Self> {
        let lower = hint.trim().to_ascii_lowercase();
        if lower.contains("postgres") {
            Some(Self::PostgreSQL)
        } else if lower.contains("mysql") || lower.contains("mariadb") {
            Some(Self::MySQL)
        } else if lower.contains("sqlite") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Connection parameters for the internal datasource, read once at startup.
///
/// Fields are optional so the connection provider can report exactly which
/// one is missing.
#[derive(Clone, Default)]
pub struct ConnectionParams {
    pub driver: Option<String>,
    /// Contains sensitive data - log `masked_url()` instead
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectionParams {
    pub fn new(
        driver: impl Into<String>,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            driver: Some(driver.into()),
            url: Some(url.into()),
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Get a display-safe version of the URL (password masked).
    pub fn masked_url(&self) -> Option<String> {
        let raw = self.url.as_deref()?;
        match Url::parse(raw) {
            Ok(mut url) if url.password().is_some() => {
                // set_password only fails for cannot-be-a-base URLs, which carry no password
                let _ = url.set_password(Some("****"));
                Some(url.to_string())
            }
            _ => Some(raw.to_string()),
        }
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("driver", &self.driver)
            .field("url", &self.masked_url())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}
