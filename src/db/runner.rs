//! Transaction runner: runs a unit of work inside one internal transaction.
//!
//! Commits when the work returns `Ok`, rolls back and hands the original
//! error back when it returns `Err`. A panic or a cancelled future drops the
//! open transaction, which rolls it back.
//!
//! Nesting on the same store is not supported. Calling
//! [`TransactionRunner::run`] from inside a running unit of work bound to the
//! same mapping context fails with [`StoreError::NestedTransaction`] before a
//! second connection is taken; nested work should reuse the
//! `&mut StoreTransaction` it was given. A unit of work may still open a
//! transaction on a different store.

use crate::db::transaction::{StoreTransaction, TransactionCoordinator};
use crate::error::StoreError;
use futures_util::future::BoxFuture;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// A transaction whose unit of work is running on the current task.
#[derive(Debug, Clone)]
struct ActiveTransaction {
    context_id: usize,
    transaction_id: String,
}

tokio::task_local! {
    /// Open transactions on this task, outermost first.
    static ACTIVE_TRANSACTIONS: Vec<ActiveTransaction>;
}

/// The future a unit of work returns. It borrows the transaction for `'t`.
pub type UnitOfWork<'t, T, E> = BoxFuture<'t, Result<T, E>>;

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", Uuid::new_v4().simple())
}

/// True if the current task is inside a unit of work started by a runner.
pub fn in_transaction() -> bool {
    ACTIVE_TRANSACTIONS
        .try_with(|active| !active.is_empty())
        .unwrap_or(false)
}

/// Runs units of work on the internal store's coordinator.
#[derive(Debug, Clone)]
pub struct TransactionRunner {
    coordinator: TransactionCoordinator,
}

impl TransactionRunner {
    pub fn new(coordinator: TransactionCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// Run `work` inside a new internal transaction.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let setting = runner
    ///     .run(move |tx| Box::pin(async move { repo.find(tx, &key).await }))
    ///     .await?;
    /// ```
    ///
    /// Errors from begin or commit surface as `E::from(StoreError)`. Errors
    /// returned by `work` are passed through unchanged after rollback; a
    /// failed rollback is logged and does not replace them.
    pub async fn run<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut StoreTransaction) -> UnitOfWork<'t, T, E>,
        E: From<StoreError>,
    {
        let context_id = self.coordinator.context_id();
        let mut active = ACTIVE_TRANSACTIONS
            .try_with(|active| active.clone())
            .unwrap_or_default();
        if let Some(outer) = active.iter().find(|t| t.context_id == context_id) {
            warn!(
                outer_transaction = %outer.transaction_id,
                "Rejected nested internal transaction"
            );
            return Err(StoreError::NestedTransaction.into());
        }

        let transaction_id = generate_transaction_id();
        let started = Instant::now();
        let mut tx = self.coordinator.begin().await?;
        debug!(transaction_id = %transaction_id, "Running unit of work");

        active.push(ActiveTransaction {
            context_id,
            transaction_id: transaction_id.clone(),
        });
        let outcome = ACTIVE_TRANSACTIONS.scope(active, work(&mut tx)).await;

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!(
                    transaction_id = %transaction_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Committed internal transaction"
                );
                Ok(value)
            }
            Err(e) => {
                match tx.rollback().await {
                    Ok(()) => debug!(
                        transaction_id = %transaction_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Rolled back internal transaction"
                    ),
                    Err(rollback_err) => warn!(
                        transaction_id = %transaction_id,
                        error = %rollback_err,
                        "Rollback failed"
                    ),
                }
                Err(e)
            }
        }
    }
}
