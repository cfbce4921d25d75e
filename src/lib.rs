//! SnapAdmin internal store.
//!
//! A private persistence stack for the admin tool's own metadata (user
//! settings and operations history), kept apart from the host application's
//! database and transactions. Works on SQLite, PostgreSQL and MySQL.
//!
//! Everything hangs off [`InternalStore`]: when `snapadmin.enabled` is off it
//! builds nothing, otherwise it owns the pool, the mapping context and the
//! transaction runner that units of work go through.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use config::{Config, SchemaMode};
pub use db::{StoreTransaction, TransactionCoordinator, TransactionRunner};
pub use error::{StoreError, StoreResult};
pub use store::{InternalStore, StoreStatus};
