//! Activation gate and entry point for the rest of the admin tool.
//!
//! [`InternalStore::bootstrap`] reads `snapadmin.enabled` once. When the flag
//! is off nothing is built and no connection is opened; when it is on the
//! pool, mapping context, coordinator and runner are built in that order and
//! any startup failure is returned to the caller.

use crate::config::{Config, SchemaMode};
use crate::db::{
    ConnectionProvider, MappingContext, SchemaReport, StoreTransaction, TransactionCoordinator,
    TransactionRunner, UnitOfWork,
};
use crate::error::{StoreError, StoreResult};
use crate::models::DatabaseType;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
struct ActiveStore {
    context: Arc<MappingContext>,
    runner: TransactionRunner,
}

/// The admin tool's private persistence stack, or its absence.
#[derive(Debug, Clone)]
pub struct InternalStore {
    state: Option<Arc<ActiveStore>>,
}

/// Snapshot of an active store for operators.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub db_type: DatabaseType,
    pub server_version: Option<String>,
    pub entity_set: &'static str,
    pub tables: Vec<&'static str>,
    pub schema_mode: SchemaMode,
    pub schema_report: SchemaReport,
}

impl InternalStore {
    /// Build the store if the gate is open.
    pub async fn bootstrap(config: &Config) -> StoreResult<Self> {
        if !config.enabled {
            info!("Internal store disabled (snapadmin.enabled=false)");
            return Ok(Self::disabled());
        }

        let (params, pool_options) = config.datasource()?;
        let pool = ConnectionProvider::build(&params, &pool_options).await?;

        // An absent dialect hint follows the engine behind the pool
        let dialect = config
            .dialect
            .clone()
            .unwrap_or_else(|| pool.db_type().display_name().to_string());
        let context = Arc::new(
            MappingContext::build(pool, &config.entity_set, &dialect, config.schema_mode).await?,
        );

        let coordinator = TransactionCoordinator::for_context(&context);
        let runner = TransactionRunner::new(coordinator);

        info!(
            db_type = %context.db_type(),
            entity_set = context.entity_set().name,
            schema_mode = %context.schema_mode(),
            "Internal store activated"
        );

        Ok(Self {
            state: Some(Arc::new(ActiveStore { context, runner })),
        })
    }

    /// A store with the gate closed.
    pub fn disabled() -> Self {
        Self { state: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// The runner, if the store is active.
    pub fn runner(&self) -> StoreResult<&TransactionRunner> {
        self.active().map(|s| &s.runner)
    }

    /// The mapping context, if the store is active.
    pub fn context(&self) -> StoreResult<&Arc<MappingContext>> {
        self.active().map(|s| &s.context)
    }

    fn active(&self) -> StoreResult<&ActiveStore> {
        self.state.as_deref().ok_or(StoreError::NotActivated)
    }

    /// Run a unit of work in one internal transaction.
    ///
    /// Fails with [`StoreError::NotActivated`] when the gate is closed.
    pub async fn run_in_transaction<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut StoreTransaction) -> UnitOfWork<'t, T, E>,
        E: From<StoreError>,
    {
        let runner = self.runner()?;
        runner.run(work).await
    }

    pub fn status(&self) -> StoreResult<StoreStatus> {
        let context = self.context()?;
        Ok(StoreStatus {
            db_type: context.db_type(),
            server_version: context.server_version().map(str::to_string),
            entity_set: context.entity_set().name,
            tables: context.entity_set().tables().collect(),
            schema_mode: context.schema_mode(),
            schema_report: context.schema_report().clone(),
        })
    }

    /// Apply create-drop teardown and close the pool. No-op when disabled.
    pub async fn shutdown(&self) -> StoreResult<()> {
        match &self.state {
            Some(active) => active.context.shutdown().await,
            None => Ok(()),
        }
    }
}
