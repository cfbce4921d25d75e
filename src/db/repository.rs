//! Typed data access for the internal entities.
//!
//! Repositories never own a connection. Every operation takes the
//! `&mut StoreTransaction` handed to a unit of work, so all reads and writes
//! of one unit share its transaction.

use crate::db::params::bind_markers;
use crate::db::transaction::StoreTransaction;
use crate::error::{StoreError, StoreResult};
use crate::models::{ActionType, DatabaseType, Setting, UserAction};
use chrono::{DateTime, Utc};
use tracing::debug;

mod queries {
    pub const SETTING_FIND: &str = "SELECT id, setting_value FROM user_setting WHERE id = ?";

    pub const SETTING_FIND_ALL: &str = "SELECT id, setting_value FROM user_setting ORDER BY id";

    pub const SETTING_INSERT: &str = "INSERT INTO user_setting (id, setting_value) VALUES (?, ?)";

    pub const SETTING_UPSERT: &str = "INSERT INTO user_setting (id, setting_value) VALUES (?, ?) \
         ON CONFLICT (id) DO UPDATE SET setting_value = excluded.setting_value";

    pub const SETTING_UPSERT_MYSQL: &str = "INSERT INTO user_setting (id, setting_value) VALUES (?, ?) \
         ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value)";

    pub const SETTING_DELETE: &str = "DELETE FROM user_setting WHERE id = ?";

    pub const SETTING_COUNT: &str = "SELECT COUNT(*) FROM user_setting";

    pub const ACTION_INSERT: &str = "INSERT INTO user_action \
         (id, created_at, sql_statement, on_table, primary_key, action_type, username) \
         VALUES (?, ?, ?, ?, ?, ?, ?)";

    pub const ACTION_RECENT: &str = "SELECT id, created_at, sql_statement, on_table, primary_key, action_type, username \
         FROM user_action ORDER BY created_at DESC, id DESC LIMIT ?";

    pub const ACTION_COUNT: &str = "SELECT COUNT(*) FROM user_action";
}

type ActionRow = (
    String,
    DateTime<Utc>,
    String,
    String,
    String,
    String,
    Option<String>,
);

/// Access to the `user_setting` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingRepository;

impl SettingRepository {
    pub async fn find(&self, tx: &mut StoreTransaction, key: &str) -> StoreResult<Option<Setting>> {
        let sql = bind_markers(queries::SETTING_FIND, tx.db_type());
        let row = with_transaction!(tx, t => {
            sqlx::query_as::<_, (String, String)>(&sql)
                .bind(key)
                .fetch_optional(&mut **t)
                .await?
        });
        Ok(row.map(|(key, value)| Setting { key, value }))
    }

    /// All settings, ordered by key.
    pub async fn find_all(&self, tx: &mut StoreTransaction) -> StoreResult<Vec<Setting>> {
        let rows = with_transaction!(tx, t => {
            sqlx::query_as::<_, (String, String)>(queries::SETTING_FIND_ALL)
                .fetch_all(&mut **t)
                .await?
        });
        Ok(rows
            .into_iter()
            .map(|(key, value)| Setting { key, value })
            .collect())
    }

    /// Insert a new setting. A duplicate key fails with a unique violation.
    pub async fn insert(&self, tx: &mut StoreTransaction, setting: &Setting) -> StoreResult<()> {
        let sql = bind_markers(queries::SETTING_INSERT, tx.db_type());
        with_transaction!(tx, t => {
            sqlx::query(&sql)
                .bind(&setting.key)
                .bind(&setting.value)
                .execute(&mut **t)
                .await?;
        });
        debug!(key = %setting.key, "Inserted setting");
        Ok(())
    }

    /// Insert or overwrite a setting.
    pub async fn save(&self, tx: &mut StoreTransaction, setting: &Setting) -> StoreResult<()> {
        let sql = match tx.db_type() {
            DatabaseType::MySQL => queries::SETTING_UPSERT_MYSQL.to_string(),
            db_type => bind_markers(queries::SETTING_UPSERT, db_type),
        };
        with_transaction!(tx, t => {
            sqlx::query(&sql)
                .bind(&setting.key)
                .bind(&setting.value)
                .execute(&mut **t)
                .await?;
        });
        debug!(key = %setting.key, "Saved setting");
        Ok(())
    }

    /// Returns true if a row was deleted.
    pub async fn delete(&self, tx: &mut StoreTransaction, key: &str) -> StoreResult<bool> {
        let sql = bind_markers(queries::SETTING_DELETE, tx.db_type());
        let rows_affected = with_transaction!(tx, t => {
            sqlx::query(&sql)
                .bind(key)
                .execute(&mut **t)
                .await?
                .rows_affected()
        });
        Ok(rows_affected > 0)
    }

    pub async fn count(&self, tx: &mut StoreTransaction) -> StoreResult<i64> {
        let count = with_transaction!(tx, t => {
            sqlx::query_scalar::<_, i64>(queries::SETTING_COUNT)
                .fetch_one(&mut **t)
                .await?
        });
        Ok(count)
    }
}

/// Access to the `user_action` table (operations history).
#[derive(Debug, Clone, Copy, Default)]
pub struct UserActionRepository;

impl UserActionRepository {
    pub async fn record(&self, tx: &mut StoreTransaction, action: &UserAction) -> StoreResult<()> {
        let sql = bind_markers(queries::ACTION_INSERT, tx.db_type());
        with_transaction!(tx, t => {
            sqlx::query(&sql)
                .bind(&action.id)
                .bind(action.created_at)
                .bind(&action.sql)
                .bind(&action.on_table)
                .bind(&action.primary_key)
                .bind(action.action_type.as_str())
                .bind(action.username.as_deref())
                .execute(&mut **t)
                .await?;
        });
        debug!(
            id = %action.id,
            on_table = %action.on_table,
            action_type = %action.action_type,
            "Recorded user action"
        );
        Ok(())
    }

    /// Most recent actions first.
    pub async fn find_recent(
        &self,
        tx: &mut StoreTransaction,
        limit: u32,
    ) -> StoreResult<Vec<UserAction>> {
        let sql = bind_markers(queries::ACTION_RECENT, tx.db_type());
        let rows = with_transaction!(tx, t => {
            sqlx::query_as::<_, ActionRow>(&sql)
                .bind(i64::from(limit))
                .fetch_all(&mut **t)
                .await?
        });
        rows.into_iter().map(action_from_row).collect()
    }

    pub async fn count(&self, tx: &mut StoreTransaction) -> StoreResult<i64> {
        let count = with_transaction!(tx, t => {
            sqlx::query_scalar::<_, i64>(queries::ACTION_COUNT)
                .fetch_one(&mut **t)
                .await?
        });
        Ok(count)
    }
}

fn action_from_row(row: ActionRow) -> StoreResult<UserAction> {
    let (id, created_at, sql, on_table, primary_key, action_type, username) = row;
    let action_type = ActionType::parse(&action_type).ok_or_else(|| {
        StoreError::internal(format!(
            "Unknown action type '{}' in user_action row {}",
            action_type, id
        ))
    })?;
    Ok(UserAction {
        id,
        created_at,
        sql,
        on_table,
        primary_key,
        action_type,
        username,
    })
}
