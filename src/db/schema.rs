//! Schema management for the internal store.
//!
//! Reconciles the live schema with the declared entity set according to the
//! configured [`SchemaMode`]. DDL is generated per engine from the typed
//! column declarations; introspection reads each engine's catalog.
//!
//! # Modes
//!
//! - `validate`: every declared table and column must exist (compared by name)
//! - `update`: create missing tables, add missing non-key columns as nullable
//! - `create`: drop and recreate every declared table
//! - `create-drop`: as `create`; tables are dropped again on shutdown

use crate::config::SchemaMode;
use crate::db::pool::DbPool;
use crate::error::{StoreError, StoreResult};
use crate::models::{ColumnDefinition, DatabaseType, EntityDefinition, EntitySet};
use tracing::{debug, info};

/// What a schema pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SchemaReport {
    pub created_tables: Vec<String>,
    pub dropped_tables: Vec<String>,
    /// `table.column` entries
    pub added_columns: Vec<String>,
}

impl SchemaReport {
    pub fn is_unchanged(&self) -> bool {
        self.created_tables.is_empty()
            && self.dropped_tables.is_empty()
            && self.added_columns.is_empty()
    }
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub const SQLITE_COLUMNS: &str = "SELECT name FROM pragma_table_info(?)";

    pub const POSTGRES_COLUMNS: &str = r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#;

    pub const MYSQL_COLUMNS: &str = r#"
        SELECT CAST(column_name AS CHAR)
        FROM information_schema.columns
        WHERE table_schema = DATABASE() AND table_name = ?
        ORDER BY ordinal_position
        "#;
}

/// Render a column definition for CREATE TABLE / ALTER TABLE.
fn column_sql(column: &ColumnDefinition, db_type: DatabaseType, enforce_not_null: bool) -> String {
    let mut sql = format!("{} {}", column.name, column.column_type.sql_type(db_type));
    if enforce_not_null && !column.nullable {
        sql.push_str(" NOT NULL");
    }
    sql
}

pub fn create_table_sql(entity: &EntityDefinition, db_type: DatabaseType) -> String {
    let mut parts: Vec<String> = entity
        .columns
        .iter()
        .map(|c| column_sql(c, db_type, true))
        .collect();
    let keys: Vec<&str> = entity.primary_key().map(|c| c.name).collect();
    if !keys.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        entity.table,
        parts.join(", ")
    )
}

pub fn drop_table_sql(entity: &EntityDefinition) -> String {
    format!("DROP TABLE IF EXISTS {}", entity.table)
}

/// Added columns are always nullable so existing rows stay valid.
pub fn add_column_sql(
    entity: &EntityDefinition,
    column: &ColumnDefinition,
    db_type: DatabaseType,
) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        entity.table,
        column_sql(column, db_type, false)
    )
}

/// Declared columns that are absent from the live column list.
fn missing_columns<'e>(entity: &'e EntityDefinition, live: &[String]) -> Vec<&'e ColumnDefinition> {
    entity
        .columns
        .iter()
        .filter(|c| !live.iter().any(|l| l.eq_ignore_ascii_case(c.name)))
        .collect()
}

/// Reads and reshapes the internal store's schema.
pub(crate) struct SchemaManager<'a> {
    pool: &'a DbPool,
    db_type: DatabaseType,
}

impl<'a> SchemaManager<'a> {
    pub(crate) fn new(pool: &'a DbPool, db_type: DatabaseType) -> Self {
        Self { pool, db_type }
    }

    /// Column names of a live table, in declaration order. Empty if the table does not exist.
    pub(crate) async fn live_columns(&self, table: &str) -> StoreResult<Vec<String>> {
        let sql = match self.db_type {
            DatabaseType::SQLite => queries::SQLITE_COLUMNS,
            DatabaseType::PostgreSQL => queries::POSTGRES_COLUMNS,
            DatabaseType::MySQL => queries::MYSQL_COLUMNS,
        };
        let columns = with_pool!(self.pool, p => {
            sqlx::query_scalar::<_, String>(sql)
                .bind(table)
                .fetch_all(p)
                .await?
        });
        Ok(columns)
    }

    async fn execute(&self, sql: &str) -> StoreResult<()> {
        debug!(sql = %sql, "Executing DDL");
        with_pool!(self.pool, p => {
            sqlx::query(sql).execute(p).await?;
        });
        Ok(())
    }

    /// Apply a schema mode to every entity in the set.
    pub(crate) async fn apply(&self, entities: &EntitySet, mode: SchemaMode) -> StoreResult<SchemaReport> {
        let report = match mode {
            SchemaMode::Validate => {
                self.validate(entities).await?;
                SchemaReport::default()
            }
            SchemaMode::Update => self.update(entities).await?,
            SchemaMode::Create | SchemaMode::CreateDrop => self.recreate(entities).await?,
        };

        info!(
            entity_set = entities.name,
            schema_mode = %mode,
            created = report.created_tables.len(),
            dropped = report.dropped_tables.len(),
            added_columns = report.added_columns.len(),
            "Internal schema ready"
        );
        Ok(report)
    }

    async fn validate(&self, entities: &EntitySet) -> StoreResult<()> {
        for entity in entities.entities {
            let live = self.live_columns(entity.table).await?;
            if live.is_empty() {
                return Err(StoreError::schema_mismatch(
                    entity.name,
                    format!("table '{}' does not exist", entity.table),
                ));
            }
            if let Some(column) = missing_columns(entity, &live).first() {
                return Err(StoreError::schema_mismatch(
                    entity.name,
                    format!(
                        "column '{}' is missing from table '{}'",
                        column.name, entity.table
                    ),
                ));
            }
            debug!(table = entity.table, "Table matches declaration");
        }
        Ok(())
    }

    async fn update(&self, entities: &EntitySet) -> StoreResult<SchemaReport> {
        let mut report = SchemaReport::default();
        for entity in entities.entities {
            let live = self.live_columns(entity.table).await?;
            if live.is_empty() {
                self.execute(&create_table_sql(entity, self.db_type)).await?;
                report.created_tables.push(entity.table.to_string());
                continue;
            }

            for column in missing_columns(entity, &live) {
                if column.primary_key {
                    return Err(StoreError::schema_mismatch(
                        entity.name,
                        format!(
                            "primary key column '{}' is missing from table '{}' and cannot be added",
                            column.name, entity.table
                        ),
                    ));
                }
                self.execute(&add_column_sql(entity, column, self.db_type))
                    .await?;
                report
                    .added_columns
                    .push(format!("{}.{}", entity.table, column.name));
            }
        }
        Ok(report)
    }

    async fn recreate(&self, entities: &EntitySet) -> StoreResult<SchemaReport> {
        let mut report = self.drop_all(entities).await?;
        for entity in entities.entities {
            self.execute(&create_table_sql(entity, self.db_type)).await?;
            report.created_tables.push(entity.table.to_string());
        }
        Ok(report)
    }

    /// Drop every declared table, last declared first.
    pub(crate) async fn drop_all(&self, entities: &EntitySet) -> StoreResult<SchemaReport> {
        let mut report = SchemaReport::default();
        for entity in entities.entities.iter().rev() {
            self.execute(&drop_table_sql(entity)).await?;
            report.dropped_tables.push(entity.table.to_string());
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{USER_ACTION, USER_SETTING};

    #[test]
    fn test_create_table_sql_sqlite() {
        assert_eq!(
            create_table_sql(&USER_SETTING, DatabaseType::SQLite),
            "CREATE TABLE IF NOT EXISTS user_setting (id TEXT NOT NULL, setting_value TEXT NOT NULL, PRIMARY KEY (id))"
        );
    }

    #[test]
    fn test_create_table_sql_mysql_uses_bounded_keys() {
        let sql = create_table_sql(&USER_SETTING, DatabaseType::MySQL);
        assert!(sql.contains("id VARCHAR(255) NOT NULL"));
        assert!(sql.contains("setting_value LONGTEXT NOT NULL"));
    }

    #[test]
    fn test_nullable_columns_have_no_constraint() {
        let sql = create_table_sql(&USER_ACTION, DatabaseType::PostgreSQL);
        assert!(sql.contains("created_at TIMESTAMPTZ NOT NULL"));
        assert!(sql.contains("username VARCHAR(255),") || sql.contains("username VARCHAR(255) "));
        assert!(!sql.contains("username VARCHAR(255) NOT NULL"));
    }

    #[test]
    fn test_add_column_is_nullable() {
        let column = USER_SETTING.column("setting_value").unwrap();
        assert_eq!(
            add_column_sql(&USER_SETTING, column, DatabaseType::SQLite),
            "ALTER TABLE user_setting ADD COLUMN setting_value TEXT"
        );
    }

    #[test]
    fn test_drop_table_sql() {
        assert_eq!(drop_table_sql(&USER_ACTION), "DROP TABLE IF EXISTS user_action");
    }

    #[test]
    fn test_missing_columns_case_insensitive() {
        let live = vec!["ID".to_string()];
        let missing = missing_columns(&USER_SETTING, &live);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "setting_value");
    }

    #[test]
    fn test_report_unchanged() {
        assert!(SchemaReport::default().is_unchanged());
        let report = SchemaReport {
            created_tables: vec!["user_setting".to_string()],
            ..SchemaReport::default()
        };
        assert!(!report.is_unchanged());
    }
}
