//! Database layer of the internal store.
//!
//! Built leaves first:
//! - Connection provider and the opaque pool it returns
//! - Schema management for the declared entity set
//! - Mapping context binding the pool to that entity set
//! - Transaction coordinator and runner
//! - Repositories for the internal entities
//! - Engine dispatch macros and bind marker rewriting

#[macro_use]
pub mod macros;
pub mod mapping;
pub mod params;
pub mod pool;
pub mod repository;
pub mod runner;
pub mod schema;
pub mod transaction;

pub use mapping::MappingContext;
pub use pool::{ConnectionProvider, StorePool};
pub use repository::{SettingRepository, UserActionRepository};
pub use runner::{TransactionRunner, UnitOfWork, in_transaction};
pub use schema::SchemaReport;
pub use transaction::{StoreTransaction, TransactionCoordinator};
