//! Connection provider for the internal store.
//!
//! Builds the store's private connection pool using engine-specific pools
//! (MySqlPool, PgPool, SqlitePool) to ensure full type support. The pool is
//! opened eagerly: at least one physical connection is established and the
//! server version queried before `build` returns.

use crate::config::PoolOptions;
use crate::error::{StoreError, StoreResult};
use crate::models::{ConnectionParams, DatabaseType};
use sqlx::{
    MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    postgres::PgConnectOptions, postgres::PgPoolOptions, sqlite::SqliteConnectOptions,
    sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub(crate) enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

/// The internal store's connection pool.
///
/// Opaque on purpose: code outside this crate cannot issue queries on it and
/// must go through the transaction runner.
#[derive(Debug, Clone)]
pub struct StorePool {
    inner: DbPool,
    db_type: DatabaseType,
    server_version: Option<String>,
    acquire_timeout: Duration,
}

impl StorePool {
    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Server version reported when the pool was opened.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// How long a caller waits for a free connection.
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Number of connections currently open (idle or in use).
    pub fn size(&self) -> u32 {
        with_pool!(&self.inner, p => p.size())
    }

    pub fn is_closed(&self) -> bool {
        with_pool!(&self.inner, p => p.is_closed())
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        with_pool!(&self.inner, p => p.close().await)
    }

    pub(crate) fn inner(&self) -> &DbPool {
        &self.inner
    }
}

/// Builds the internal store's pool from connection parameters.
pub struct ConnectionProvider;

impl ConnectionProvider {
    /// Validate the parameters, open the pool and check reachability.
    ///
    /// Fails with a configuration error if a parameter is absent, the driver
    /// is unknown or does not match the URL, or the pool options are invalid.
    /// No pool is constructed in that case. No retries.
    pub async fn build(
        params: &ConnectionParams,
        pool_options: &PoolOptions,
    ) -> StoreResult<StorePool> {
        let driver = required_non_blank(params.driver.as_deref(), "driver-class-name")?;
        let url = required_non_blank(params.url.as_deref(), "url")?;
        let username = params
            .username
            .as_deref()
            .ok_or_else(|| missing_parameter("username"))?;
        let password = params
            .password
            .as_deref()
            .ok_or_else(|| missing_parameter("password"))?;

        let db_type = DatabaseType::from_driver_name(driver).ok_or_else(|| {
            StoreError::configuration(
                format!("Driver '{}' cannot be loaded", driver),
                "Use one of the supported drivers: sqlite, postgres, mysql",
            )
        })?;

        match DatabaseType::from_connection_string(url) {
            Some(url_type) if url_type == db_type => {}
            Some(url_type) => {
                return Err(StoreError::configuration(
                    format!(
                        "Driver '{}' does not match the {} datasource URL",
                        driver, url_type
                    ),
                    "Make internal.datasource.driver-class-name agree with the URL scheme",
                ));
            }
            None => {
                return Err(StoreError::configuration(
                    "Unrecognized internal datasource URL scheme",
                    "Use sqlite:, postgres:// or mysql:// URLs",
                ));
            }
        }

        pool_options.validate().map_err(|e| {
            StoreError::configuration(
                format!("Invalid pool options: {}", e),
                "Fix the pool options in the datasource URL query string",
            )
        })?;

        let is_sqlite = db_type == DatabaseType::SQLite;
        let max_connections = if is_sqlite && is_in_memory_sqlite(url) {
            1
        } else {
            pool_options.max_connections_or_default(is_sqlite)
        };
        let min_connections = pool_options.min_connections_or_default();
        if min_connections > max_connections {
            return Err(StoreError::configuration(
                format!(
                    "Invalid pool options: min_connections ({}) cannot exceed max_connections ({})",
                    min_connections, max_connections
                ),
                "Lower min_connections or raise max_connections in the datasource URL",
            ));
        }

        info!(
            db_type = %db_type,
            url = %params.masked_url().unwrap_or_default(),
            "Opening internal datasource"
        );

        let inner = Self::create_pool(db_type, url, username, password, pool_options).await?;
        let server_version = Self::get_server_version(&inner).await;

        info!(
            db_type = %db_type,
            server_version = ?server_version,
            "Internal datasource ready"
        );

        Ok(StorePool {
            inner,
            db_type,
            server_version,
            acquire_timeout: pool_options.acquire_timeout(),
        })
    }

    async fn create_pool(
        db_type: DatabaseType,
        url: &str,
        username: &str,
        password: &str,
        pool_opts: &PoolOptions,
    ) -> StoreResult<DbPool> {
        let is_sqlite = db_type == DatabaseType::SQLite;
        let acquire_timeout = pool_opts.acquire_timeout();
        let idle_timeout = Some(pool_opts.idle_timeout());

        match db_type {
            DatabaseType::MySQL => {
                let mut options = MySqlConnectOptions::from_str(url)
                    .map_err(|e| {
                        StoreError::configuration(
                            format!("Invalid MySQL connection string: {}", e),
                            "Check the connection URL format: mysql://host:port/database",
                        )
                    })?
                    .charset("utf8mb4");
                if !username.is_empty() {
                    options = options.username(username);
                }
                if !password.is_empty() {
                    options = options.password(password);
                }

                let pool = MySqlPoolOptions::new()
                    .min_connections(pool_opts.min_connections_or_default())
                    .max_connections(pool_opts.max_connections_or_default(is_sqlite))
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(pool_opts.test_before_acquire_or_default())
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        StoreError::connection(
                            format!("Failed to connect: {}", e),
                            connection_suggestion(db_type, &e),
                        )
                    })?;
                Ok(DbPool::MySql(pool))
            }
            DatabaseType::PostgreSQL => {
                let mut options = PgConnectOptions::from_str(url).map_err(|e| {
                    StoreError::configuration(
                        format!("Invalid PostgreSQL connection string: {}", e),
                        "Check the connection URL format: postgres://host:5432/database",
                    )
                })?;
                if !username.is_empty() {
                    options = options.username(username);
                }
                if !password.is_empty() {
                    options = options.password(password);
                }

                let pool = PgPoolOptions::new()
                    .min_connections(pool_opts.min_connections_or_default())
                    .max_connections(pool_opts.max_connections_or_default(is_sqlite))
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(pool_opts.test_before_acquire_or_default())
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        StoreError::connection(
                            format!("Failed to connect: {}", e),
                            connection_suggestion(db_type, &e),
                        )
                    })?;
                Ok(DbPool::Postgres(pool))
            }
            DatabaseType::SQLite => {
                if !username.is_empty() || !password.is_empty() {
                    debug!("SQLite ignores internal datasource credentials");
                }

                let options = SqliteConnectOptions::from_str(url)
                    .map_err(|e| {
                        StoreError::configuration(
                            format!("Invalid SQLite connection string: {}", e),
                            "Check the connection URL format: sqlite:path/to/internal.db",
                        )
                    })?
                    .create_if_missing(true);

                // An in-memory database lives exactly as long as its connection
                let in_memory = is_in_memory_sqlite(url);
                let mut pool_builder = SqlitePoolOptions::new()
                    .min_connections(pool_opts.min_connections_or_default())
                    .max_connections(pool_opts.max_connections_or_default(is_sqlite))
                    .acquire_timeout(acquire_timeout)
                    .test_before_acquire(pool_opts.test_before_acquire_or_default());
                if in_memory {
                    pool_builder = pool_builder
                        .max_connections(1)
                        .idle_timeout(None::<Duration>)
                        .max_lifetime(None::<Duration>);
                } else {
                    pool_builder = pool_builder.idle_timeout(idle_timeout);
                }

                let pool = pool_builder.connect_with(options).await.map_err(|e| {
                    StoreError::connection(
                        format!("Failed to connect: {}", e),
                        connection_suggestion(db_type, &e),
                    )
                })?;
                Ok(DbPool::SQLite(pool))
            }
        }
    }

    /// Get the server version from the connected database.
    async fn get_server_version(pool: &DbPool) -> Option<String> {
        let sql = match pool {
            DbPool::SQLite(_) => "SELECT sqlite_version()",
            _ => "SELECT version()",
        };

        let result: Result<String, sqlx::Error> = with_pool!(pool, p => {
            sqlx::query_scalar::<_, String>(sql).fetch_one(p).await
        });

        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}

fn missing_parameter(name: &str) -> StoreError {
    StoreError::configuration(
        format!("Missing internal datasource parameter '{}'", name),
        format!("Set internal.datasource.{}", name),
    )
}

fn required_non_blank<'a>(value: Option<&'a str>, name: &str) -> StoreResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim()),
        _ => Err(missing_parameter(name)),
    }
}

fn is_in_memory_sqlite(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains(":memory:") || lower.contains("mode=memory")
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify internal.datasource.username and internal.datasource.password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the internal database exists".to_string();
    }

    match db_type {
        DatabaseType::PostgreSQL => {
            "Verify the connection string format: postgres://host:5432/db".to_string()
        }
        DatabaseType::MySQL => {
            "Verify the connection string format: mysql://host:3306/db".to_string()
        }
        DatabaseType::SQLite => {
            "Verify the directory exists and is writable: sqlite:path/to/internal.db".to_string()
        }
    }
}
