//! Integration tests for schema management modes on SQLite.
//!
//! Tests verify that:
//! - validate refuses a database that lacks the declared tables or columns
//! - update creates missing tables and adds missing columns, keeping data
//! - create starts from empty tables
//! - create-drop removes the tables again on shutdown

use snapadmin_store::config::{Config, SchemaMode};
use snapadmin_store::db::SettingRepository;
use snapadmin_store::models::Setting;
use snapadmin_store::{InternalStore, StoreError};
use sqlx::SqlitePool;
use tempfile::NamedTempFile;

fn sqlite_config(file: &NamedTempFile, schema_mode: SchemaMode) -> Config {
    let mut config = Config::default_config();
    config.enabled = true;
    config.driver_class_name = Some("sqlite".to_string());
    config.url = Some(format!("sqlite:{}", file.path().display()));
    config.username = Some(String::new());
    config.password = Some(String::new());
    config.schema_mode = schema_mode;
    config
}

/// Open a plain pool on the same file to look at or prepare the schema.
async fn raw_pool(file: &NamedTempFile) -> SqlitePool {
    SqlitePool::connect(&format!("sqlite:{}", file.path().display()))
        .await
        .unwrap()
}

async fn table_exists(file: &NamedTempFile, table: &str) -> bool {
    let pool = raw_pool(file).await;
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
    pool.close().await;
    count == 1
}

async fn save_setting(store: &InternalStore, key: &'static str, value: &'static str) {
    store
        .run_in_transaction(move |tx| {
            Box::pin(async move { SettingRepository.save(tx, &Setting::new(key, value)).await })
        })
        .await
        .unwrap();
}

async fn count_settings(store: &InternalStore) -> i64 {
    store
        .run_in_transaction(|tx| Box::pin(async move { SettingRepository.count(tx).await }))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_validate_fails_on_fresh_database() {
    let file = NamedTempFile::new().unwrap();

    let err = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::Validate))
        .await
        .unwrap_err();

    match &err {
        StoreError::SchemaMismatch { entity, message } => {
            assert_eq!(entity, "UserSetting");
            assert!(message.contains("user_setting"), "message: {message}");
        }
        other => panic!("Expected SchemaMismatch, got {other:?}"),
    }
    assert!(err.is_startup_fatal());
}

#[tokio::test]
async fn test_validate_reports_missing_column() {
    let file = NamedTempFile::new().unwrap();
    let pool = raw_pool(&file).await;
    sqlx::query("CREATE TABLE user_setting (id TEXT PRIMARY KEY, setting_value TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE user_action (id TEXT PRIMARY KEY, created_at TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let err = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::Validate))
        .await
        .unwrap_err();

    match err {
        StoreError::SchemaMismatch { entity, message } => {
            assert_eq!(entity, "UserAction");
            assert!(message.contains("sql_statement"), "message: {message}");
        }
        other => panic!("Expected SchemaMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_validate_accepts_schema_created_by_update() {
    let file = NamedTempFile::new().unwrap();

    let store = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::Update))
        .await
        .unwrap();
    let status = store.status().unwrap();
    assert_eq!(
        status.schema_report.created_tables,
        ["user_setting", "user_action"]
    );
    save_setting(&store, "theme", "dark").await;
    store.shutdown().await.unwrap();

    let store = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::Validate))
        .await
        .unwrap();
    assert_eq!(count_settings(&store).await, 1);
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_update_keeps_data_and_adds_missing_columns() {
    let file = NamedTempFile::new().unwrap();
    let pool = raw_pool(&file).await;
    sqlx::query("CREATE TABLE user_setting (id TEXT PRIMARY KEY, setting_value TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO user_setting (id, setting_value) VALUES ('theme', 'dark')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE user_action (id TEXT PRIMARY KEY, created_at TEXT NOT NULL, \
         sql_statement TEXT NOT NULL, on_table TEXT NOT NULL, primary_key TEXT NOT NULL, \
         action_type TEXT NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let store = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::Update))
        .await
        .unwrap();

    let report = store.status().unwrap().schema_report;
    assert!(report.created_tables.is_empty());
    assert!(report.dropped_tables.is_empty());
    assert_eq!(report.added_columns, vec!["user_action.username".to_string()]);
    assert_eq!(count_settings(&store).await, 1);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_update_cannot_add_missing_primary_key() {
    let file = NamedTempFile::new().unwrap();
    let pool = raw_pool(&file).await;
    sqlx::query("CREATE TABLE user_setting (setting_value TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let err = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::Update))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, StoreError::SchemaMismatch { message, .. } if message.contains("primary key")),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_create_starts_with_empty_tables() {
    let file = NamedTempFile::new().unwrap();

    let store = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::Update))
        .await
        .unwrap();
    save_setting(&store, "theme", "dark").await;
    store.shutdown().await.unwrap();

    let store = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::Create))
        .await
        .unwrap();
    assert_eq!(count_settings(&store).await, 0);
    store.shutdown().await.unwrap();

    // create leaves the tables in place after shutdown
    assert!(table_exists(&file, "user_setting").await);
    assert!(table_exists(&file, "user_action").await);
}

#[tokio::test]
async fn test_create_drop_removes_tables_on_shutdown() {
    let file = NamedTempFile::new().unwrap();

    let store = InternalStore::bootstrap(&sqlite_config(&file, SchemaMode::CreateDrop))
        .await
        .unwrap();
    save_setting(&store, "theme", "dark").await;
    assert!(table_exists(&file, "user_setting").await);

    store.shutdown().await.unwrap();
    // second shutdown is a no-op
    store.shutdown().await.unwrap();

    assert!(!table_exists(&file, "user_setting").await);
    assert!(!table_exists(&file, "user_action").await);
}

#[tokio::test]
async fn test_settings_entity_set_only_maps_user_setting() {
    let file = NamedTempFile::new().unwrap();
    let mut config = sqlite_config(&file, SchemaMode::Create);
    config.entity_set = "settings".to_string();

    let store = InternalStore::bootstrap(&config).await.unwrap();
    let status = store.status().unwrap();
    assert_eq!(status.entity_set, "settings");
    assert_eq!(status.tables, vec!["user_setting"]);
    store.shutdown().await.unwrap();

    assert!(table_exists(&file, "user_setting").await);
    assert!(!table_exists(&file, "user_action").await);
}
