//! Transaction coordinator for the internal store.
//!
//! The coordinator is a plain value bound to one mapping context. It is never
//! stored in a static, a registry or any lookup keyed by type or name, so
//! code that wants an internal transaction must be handed the coordinator (or
//! the runner wrapping it) explicitly. Host-side transactional code therefore
//! cannot resolve it by accident, and internal code cannot pick up the host's.

use crate::db::mapping::MappingContext;
use crate::db::pool::DbPool;
use crate::error::{StoreError, StoreResult};
use crate::models::DatabaseType;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::sync::Arc;
use tracing::debug;

/// Database-specific transaction wrapper.
///
/// Units of work receive `&mut StoreTransaction` and run their statements on
/// the engine-specific connection behind it. Dropping an uncommitted
/// transaction rolls it back.
pub enum StoreTransaction {
    /// PostgreSQL transaction
    Postgres(Transaction<'static, Postgres>),
    /// MySQL transaction
    MySql(Transaction<'static, MySql>),
    /// SQLite transaction
    SQLite(Transaction<'static, Sqlite>),
}

impl std::fmt::Debug for StoreTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreTransaction")
            .field(&self.db_type())
            .finish()
    }
}

impl StoreTransaction {
    /// Get the database type for this transaction.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            StoreTransaction::MySql(_) => DatabaseType::MySQL,
            StoreTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            StoreTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> StoreResult<()> {
        match self {
            StoreTransaction::MySql(tx) => tx.commit().await.map_err(StoreError::from),
            StoreTransaction::Postgres(tx) => tx.commit().await.map_err(StoreError::from),
            StoreTransaction::SQLite(tx) => tx.commit().await.map_err(StoreError::from),
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> StoreResult<()> {
        match self {
            StoreTransaction::MySql(tx) => tx.rollback().await.map_err(StoreError::from),
            StoreTransaction::Postgres(tx) => tx.rollback().await.map_err(StoreError::from),
            StoreTransaction::SQLite(tx) => tx.rollback().await.map_err(StoreError::from),
        }
    }
}

/// Transaction manager for the internal store, bound 1:1 to a mapping context.
#[derive(Clone)]
pub struct TransactionCoordinator {
    context: Arc<MappingContext>,
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("context", &self.context)
            .finish()
    }
}

impl TransactionCoordinator {
    /// Create a coordinator for a fully built mapping context.
    ///
    /// Calling this twice with the same context yields two interchangeable
    /// coordinators; nothing is registered anywhere.
    pub fn for_context(context: &Arc<MappingContext>) -> Self {
        Self {
            context: Arc::clone(context),
        }
    }

    pub fn context(&self) -> &MappingContext {
        &self.context
    }

    /// True if this coordinator is bound to exactly this context.
    pub fn is_bound_to(&self, context: &Arc<MappingContext>) -> bool {
        Arc::ptr_eq(&self.context, context)
    }

    /// Identity of the bound context, shared by every coordinator built for it.
    pub(crate) fn context_id(&self) -> usize {
        Arc::as_ptr(&self.context) as usize
    }

    /// Acquire a pooled connection and start a transaction on it.
    ///
    /// Waits for a free connection up to the pool's acquire timeout and reports
    /// that configured limit if none frees up.
    pub async fn begin(&self) -> StoreResult<StoreTransaction> {
        if self.context.is_shut_down() {
            return Err(StoreError::connection(
                "Internal store has been shut down",
                "Transactions cannot start after shutdown",
            ));
        }

        let pool = self.context.pool();
        let acquire_error = |e: sqlx::Error| match e {
            sqlx::Error::PoolTimedOut => StoreError::timeout(
                "connection pool acquire",
                pool.acquire_timeout().as_secs(),
            ),
            other => StoreError::from(other),
        };
        let tx = match pool.inner() {
            DbPool::Postgres(p) => {
                StoreTransaction::Postgres(p.begin().await.map_err(acquire_error)?)
            }
            DbPool::MySql(p) => {
                StoreTransaction::MySql(p.begin().await.map_err(acquire_error)?)
            }
            DbPool::SQLite(p) => {
                StoreTransaction::SQLite(p.begin().await.map_err(acquire_error)?)
            }
        };
        debug!(db_type = %tx.db_type(), "Began internal transaction");
        Ok(tx)
    }
}
