//! Engine dispatch macros for reducing code duplication.
//!
//! The internal store keeps engine-specific sqlx pools and transactions
//! (no `AnyPool`), so every query is written once and expanded per engine.
//! The body is compiled three times, once against each concrete database
//! type, which keeps type checking exact.

/// Run `$body` with `$pool` bound to the engine-specific pool behind a `DbPool`.
///
/// # Example
///
/// ```ignore
/// let version: String = with_pool!(pool, p => {
///     sqlx::query_scalar("SELECT version()").fetch_one(p).await?
/// });
/// ```
macro_rules! with_pool {
    ($target:expr, $pool:ident => $body:expr) => {
        match $target {
            $crate::db::pool::DbPool::Postgres($pool) => $body,
            $crate::db::pool::DbPool::MySql($pool) => $body,
            $crate::db::pool::DbPool::SQLite($pool) => $body,
        }
    };
}

/// Run `$body` with `$tx` bound to the engine-specific sqlx transaction
/// behind a `&mut StoreTransaction`. Use `&mut **$tx` as the executor.
macro_rules! with_transaction {
    ($target:expr, $tx:ident => $body:expr) => {
        match $target {
            $crate::db::transaction::StoreTransaction::Postgres($tx) => $body,
            $crate::db::transaction::StoreTransaction::MySql($tx) => $body,
            $crate::db::transaction::StoreTransaction::SQLite($tx) => $body,
        }
    };
}
