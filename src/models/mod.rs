//! Data models for the internal store.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod entity;
pub mod internal;

// Re-export commonly used types
pub use connection::{ConnectionParams, DatabaseType};
pub use entity::{
    ColumnDefinition, ColumnType, EntityDefinition, EntitySet, INTERNAL_ENTITIES,
    SETTINGS_ENTITIES,
};
pub use internal::{ActionType, Setting, USER_ACTION, USER_SETTING, UserAction};
