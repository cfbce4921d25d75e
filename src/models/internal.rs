//! The admin tool's own entities: user settings and the operations history.

use super::entity::{ColumnDefinition, ColumnType, EntityDefinition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const USER_SETTING: EntityDefinition = EntityDefinition {
    name: "UserSetting",
    table: "user_setting",
    columns: &[
        ColumnDefinition::key("id", ColumnType::Varchar(255)),
        ColumnDefinition::required("setting_value", ColumnType::Text),
    ],
};

pub const USER_ACTION: EntityDefinition = EntityDefinition {
    name: "UserAction",
    table: "user_action",
    columns: &[
        ColumnDefinition::key("id", ColumnType::Varchar(36)),
        ColumnDefinition::required("created_at", ColumnType::Timestamp),
        ColumnDefinition::required("sql_statement", ColumnType::Text),
        ColumnDefinition::required("on_table", ColumnType::Varchar(255)),
        ColumnDefinition::required("primary_key", ColumnType::Varchar(255)),
        ColumnDefinition::required("action_type", ColumnType::Varchar(16)),
        ColumnDefinition::optional("username", ColumnType::Varchar(255)),
    ],
};

/// A single user setting (e.g. UI theme).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Kind of write an admin user performed on a host table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Create,
    Edit,
    Delete,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Edit => "EDIT",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Some(Self::Create),
            "EDIT" => Some(Self::Edit),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the operations history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Statement that was executed against the host database
    pub sql: String,
    pub on_table: String,
    /// Primary key of the affected row, rendered as text
    pub primary_key: String,
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserAction {
    /// Create a new action stamped with a fresh id and the current time.
    pub fn new(
        on_table: impl Into<String>,
        primary_key: impl Into<String>,
        action_type: ActionType,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            sql: sql.into(),
            on_table: on_table.into(),
            primary_key: primary_key.into(),
            action_type,
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}
