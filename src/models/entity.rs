//! Entity declarations for the internal store.
//!
//! The store maps a closed set of entities known at compile time. Each entity
//! is a table with typed columns; entity sets group them under a name that is
//! resolved at startup.

use super::connection::DatabaseType;
use super::internal::{USER_ACTION, USER_SETTING};

/// Column types the internal entities use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Bounded string, usable as a key on every engine
    Varchar(u16),
    Text,
    /// UTC timestamp
    Timestamp,
}

impl ColumnType {
    /// SQL type name for the given engine.
    pub fn sql_type(&self, db_type: DatabaseType) -> String {
        match (self, db_type) {
            (Self::Varchar(_), DatabaseType::SQLite) => "TEXT".to_string(),
            (Self::Varchar(len), _) => format!("VARCHAR({})", len),
            (Self::Text, DatabaseType::MySQL) => "LONGTEXT".to_string(),
            (Self::Text, _) => "TEXT".to_string(),
            // sqlx stores chrono values as RFC 3339 text on SQLite
            (Self::Timestamp, DatabaseType::SQLite) => "TEXT".to_string(),
            (Self::Timestamp, DatabaseType::PostgreSQL) => "TIMESTAMPTZ".to_string(),
            (Self::Timestamp, DatabaseType::MySQL) => "DATETIME(6)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDefinition {
    /// A non-null primary key column.
    pub const fn key(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: false,
            primary_key: true,
        }
    }

    pub const fn required(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: false,
            primary_key: false,
        }
    }

    pub const fn optional(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: true,
            primary_key: false,
        }
    }
}

/// A declared entity: one table and its columns.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityDefinition {
    /// Entity name used in logs and errors
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [ColumnDefinition],
}

impl EntityDefinition {
    /// Primary key columns in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A named, closed set of entities managed by one mapping context.
#[derive(Debug, PartialEq, Eq)]
pub struct EntitySet {
    pub name: &'static str,
    pub entities: &'static [&'static EntityDefinition],
}

/// Everything the admin tool persists: settings and operations history.
pub static INTERNAL_ENTITIES: EntitySet = EntitySet {
    name: "internal",
    entities: &[&USER_SETTING, &USER_ACTION],
};

/// Settings only.
pub static SETTINGS_ENTITIES: EntitySet = EntitySet {
    name: "settings",
    entities: &[&USER_SETTING],
};

static CATALOG: &[&EntitySet] = &[&INTERNAL_ENTITIES, &SETTINGS_ENTITIES];

impl EntitySet {
    /// Resolve an entity set by name (case-insensitive).
    pub fn resolve(name: &str) -> Option<&'static EntitySet> {
        CATALOG
            .iter()
            .copied()
            .find(|set| set.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Names of all entity sets in the catalog.
    pub fn known_names() -> Vec<&'static str> {
        CATALOG.iter().map(|set| set.name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.entities.iter().any(|e| e.table == table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entities.iter().map(|e| e.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_sets() {
        let set = EntitySet::resolve("internal").unwrap();
        assert_eq!(set.entities.len(), 2);
        assert!(set.contains_table("user_setting"));
        assert!(set.contains_table("user_action"));

        let set = EntitySet::resolve(" Settings ").unwrap();
        assert_eq!(set.tables().collect::<Vec<_>>(), vec!["user_setting"]);
    }

    #[test]
    fn test_resolve_unknown_set() {
        assert!(EntitySet::resolve("host_entities").is_none());
        assert!(EntitySet::known_names().contains(&"internal"));
    }

    #[test]
    fn test_catalog_sets_are_non_empty_with_keys() {
        for set in CATALOG {
            assert!(!set.is_empty(), "entity set '{}' is empty", set.name);
            for entity in set.entities {
                assert!(
                    entity.primary_key().count() > 0,
                    "entity '{}' has no primary key",
                    entity.name
                );
            }
        }
    }

    #[test]
    fn test_sql_types_per_engine() {
        assert_eq!(ColumnType::Varchar(255).sql_type(DatabaseType::MySQL), "VARCHAR(255)");
        assert_eq!(ColumnType::Varchar(255).sql_type(DatabaseType::SQLite), "TEXT");
        assert_eq!(ColumnType::Text.sql_type(DatabaseType::MySQL), "LONGTEXT");
        assert_eq!(
            ColumnType::Timestamp.sql_type(DatabaseType::PostgreSQL),
            "TIMESTAMPTZ"
        );
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        assert!(USER_SETTING.column("SETTING_VALUE").is_some());
        assert!(USER_SETTING.column("missing").is_none());
    }
}
