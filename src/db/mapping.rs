//! Mapping context: binds the pool to one fixed entity set and applies the
//! schema-management policy at construction time.

use crate::config::SchemaMode;
use crate::db::pool::StorePool;
use crate::db::schema::{SchemaManager, SchemaReport};
use crate::error::{StoreError, StoreResult};
use crate::models::{DatabaseType, EntitySet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// A pool bound to a closed entity set and a schema policy.
///
/// Owns the pool for the rest of the process. Built once per bootstrap.
pub struct MappingContext {
    pool: StorePool,
    entity_set: &'static EntitySet,
    dialect: DatabaseType,
    schema_mode: SchemaMode,
    schema_report: SchemaReport,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for MappingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingContext")
            .field("db_type", &self.pool.db_type())
            .field("entity_set", &self.entity_set.name)
            .field("dialect", &self.dialect)
            .field("schema_mode", &self.schema_mode)
            .field("shut_down", &self.shut_down.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl MappingContext {
    /// Build the context and reconcile the schema.
    ///
    /// On failure the pool is closed before the error is returned.
    pub async fn build(
        pool: StorePool,
        entity_set_name: &str,
        dialect: &str,
        schema_mode: SchemaMode,
    ) -> StoreResult<Self> {
        let resolved = Self::resolve(&pool, entity_set_name, dialect);
        let (entity_set, dialect) = match resolved {
            Ok(r) => r,
            Err(e) => {
                pool.close().await;
                return Err(e);
            }
        };

        let manager = SchemaManager::new(pool.inner(), pool.db_type());
        let schema_report = match manager.apply(entity_set, schema_mode).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    entity_set = entity_set.name,
                    schema_mode = %schema_mode,
                    error = %e,
                    "Internal schema reconciliation failed"
                );
                pool.close().await;
                return Err(e);
            }
        };

        info!(
            entity_set = entity_set.name,
            entities = entity_set.entities.len(),
            dialect = %dialect,
            schema_mode = %schema_mode,
            "Mapping context built"
        );

        Ok(Self {
            pool,
            entity_set,
            dialect,
            schema_mode,
            schema_report,
            shut_down: AtomicBool::new(false),
        })
    }

    fn resolve(
        pool: &StorePool,
        entity_set_name: &str,
        dialect: &str,
    ) -> StoreResult<(&'static EntitySet, DatabaseType)> {
        let entity_set = EntitySet::resolve(entity_set_name).ok_or_else(|| {
            StoreError::configuration(
                format!("Unknown entity set '{}'", entity_set_name),
                format!(
                    "Use one of: {}",
                    EntitySet::known_names().join(", ")
                ),
            )
        })?;
        if entity_set.is_empty() {
            return Err(StoreError::configuration(
                format!("Entity set '{}' declares no entities", entity_set.name),
                "Map at least one internal entity",
            ));
        }

        let dialect_type = DatabaseType::from_dialect_hint(dialect).ok_or_else(|| {
            StoreError::configuration(
                format!("Unknown dialect '{}'", dialect),
                "Use a dialect naming the engine: sqlite, postgresql or mysql",
            )
        })?;
        if dialect_type != pool.db_type() {
            return Err(StoreError::configuration(
                format!(
                    "Dialect '{}' does not match the {} datasource",
                    dialect,
                    pool.db_type()
                ),
                "Make internal.datasource.hibernate-dialect agree with the driver",
            ));
        }

        Ok((entity_set, dialect_type))
    }

    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    pub fn server_version(&self) -> Option<&str> {
        self.pool.server_version()
    }

    pub fn entity_set(&self) -> &'static EntitySet {
        self.entity_set
    }

    pub fn dialect(&self) -> DatabaseType {
        self.dialect
    }

    pub fn schema_mode(&self) -> SchemaMode {
        self.schema_mode
    }

    /// Changes made to the schema while building.
    pub fn schema_report(&self) -> &SchemaReport {
        &self.schema_report
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub(crate) fn pool(&self) -> &StorePool {
        &self.pool
    }

    /// Release the store: drop tables under create-drop, then close the pool.
    ///
    /// Only the first call does anything.
    pub async fn shutdown(&self) -> StoreResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut result = Ok(());
        if self.schema_mode.drops_on_shutdown() {
            let manager = SchemaManager::new(self.pool.inner(), self.pool.db_type());
            match manager.drop_all(self.entity_set).await {
                Ok(report) => info!(
                    dropped = report.dropped_tables.len(),
                    "Dropped internal tables (create-drop)"
                ),
                Err(e) => {
                    warn!(error = %e, "Failed to drop internal tables on shutdown");
                    result = Err(e);
                }
            }
        }

        self.pool.close().await;
        info!(entity_set = self.entity_set.name, "Internal store closed");
        result
    }
}
