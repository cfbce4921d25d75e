//! snapadmin-store - operator CLI for the internal store.
//!
//! Bootstraps the store from flags/environment, runs one command inside an
//! internal transaction and shuts the store down again.

use clap::{Parser, Subcommand};
use snapadmin_store::config::Config;
use snapadmin_store::db::{SettingRepository, UserActionRepository};
use snapadmin_store::models::{ActionType, Setting, USER_ACTION, UserAction};
use snapadmin_store::{InternalStore, StoreError};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "snapadmin-store",
    about = "Private datastore for SnapAdmin settings and operations history",
    version
)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show engine, entity set, schema mode and row counts
    Status,
    /// Print a setting value
    Get { key: String },
    /// Create or overwrite a setting and record the change in the history
    Set {
        key: String,
        value: String,
        /// Recorded as the author of the change
        #[arg(long)]
        username: Option<String>,
    },
    /// Print recent user actions as JSON lines, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// How a command that ran without store errors ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Done,
    /// The requested setting does not exist
    NotFound,
}

async fn run_command(store: &InternalStore, command: Command) -> Result<Outcome, StoreError> {
    match command {
        Command::Status => {
            let status = store.status()?;
            let track_actions = status.tables.contains(&USER_ACTION.table);
            let (settings, actions) = store
                .run_in_transaction(move |tx| {
                    Box::pin(async move {
                        let settings = SettingRepository.count(tx).await?;
                        let actions = if track_actions {
                            Some(UserActionRepository.count(tx).await?)
                        } else {
                            None
                        };
                        Ok::<_, StoreError>((settings, actions))
                    })
                })
                .await?;

            let mut json = serde_json::to_value(&status)
                .map_err(|e| StoreError::internal(e.to_string()))?;
            json["settings"] = settings.into();
            if let Some(actions) = actions {
                json["user_actions"] = actions.into();
            }
            println!("{}", json);
        }
        Command::Get { key } => {
            let lookup = key.clone();
            let setting = store
                .run_in_transaction(move |tx| {
                    Box::pin(async move { SettingRepository.find(tx, &lookup).await })
                })
                .await?;
            match setting {
                Some(setting) => println!("{}", setting.value),
                None => {
                    eprintln!("No setting named '{}'", key);
                    return Ok(Outcome::NotFound);
                }
            }
        }
        Command::Set {
            key,
            value,
            username,
        } => {
            let track_actions = store.status()?.tables.contains(&USER_ACTION.table);
            let action_type = store
                .run_in_transaction(move |tx| {
                    Box::pin(async move {
                        let existed = SettingRepository.find(tx, &key).await?.is_some();
                        let setting = Setting::new(key, value);
                        SettingRepository.save(tx, &setting).await?;

                        let (action_type, sql) = if existed {
                            (
                                ActionType::Edit,
                                format!(
                                    "UPDATE user_setting SET setting_value = '{}' WHERE id = '{}'",
                                    escape_literal(&setting.value),
                                    escape_literal(&setting.key)
                                ),
                            )
                        } else {
                            (
                                ActionType::Create,
                                format!(
                                    "INSERT INTO user_setting (id, setting_value) VALUES ('{}', '{}')",
                                    escape_literal(&setting.key),
                                    escape_literal(&setting.value)
                                ),
                            )
                        };
                        if track_actions {
                            let mut action =
                                UserAction::new("user_setting", &setting.key, action_type, sql);
                            action.username = username;
                            UserActionRepository.record(tx, &action).await?;
                        }
                        Ok::<_, StoreError>(action_type)
                    })
                })
                .await?;
            info!(action_type = %action_type, "Setting stored");
        }
        Command::History { limit } => {
            let actions = store
                .run_in_transaction(move |tx| {
                    Box::pin(async move { UserActionRepository.find_recent(tx, limit).await })
                })
                .await?;
            for action in actions {
                let line = serde_json::to_string(&action)
                    .map_err(|e| StoreError::internal(e.to_string()))?;
                println!("{}", line);
            }
        }
    }
    Ok(Outcome::Done)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(&cli.config);

    info!(
        schema_mode = %cli.config.schema_mode,
        entity_set = %cli.config.entity_set,
        "Starting snapadmin-store v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = match InternalStore::bootstrap(&cli.config).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Internal store failed to start");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            return Err(e.into());
        }
    };

    if !store.is_enabled() {
        eprintln!("Error: The internal store is disabled.");
        eprintln!();
        eprintln!("Usage: snapadmin-store --snapadmin-enabled \\");
        eprintln!("         --internal-datasource-driver-class-name <DRIVER> \\");
        eprintln!("         --internal-datasource-url <URL> \\");
        eprintln!("         --internal-datasource-username <USER> \\");
        eprintln!("         --internal-datasource-password <PASSWORD> <COMMAND>");
        eprintln!();
        eprintln!("Examples:");
        eprintln!(
            "  snapadmin-store --snapadmin-enabled --internal-datasource-driver-class-name sqlite \\"
        );
        eprintln!(
            "    --internal-datasource-url sqlite:snapadmin_internal.db \\"
        );
        eprintln!("    --internal-datasource-username '' --internal-datasource-password '' status");
        std::process::exit(1);
    }

    let result = run_command(&store, cli.command).await;
    let shutdown = store.shutdown().await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Command failed");
            return Err(e.into());
        }
    };
    shutdown?;

    info!("Internal store shutdown complete");
    if outcome == Outcome::NotFound {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapadmin_store::config::SchemaMode;

    async fn in_memory_store() -> InternalStore {
        let mut config = Config::default_config();
        config.enabled = true;
        config.driver_class_name = Some("sqlite".to_string());
        config.url = Some("sqlite::memory:".to_string());
        config.username = Some(String::new());
        config.password = Some(String::new());
        config.schema_mode = SchemaMode::Create;
        InternalStore::bootstrap(&config).await.unwrap()
    }

    #[test]
    fn test_escape_literal_doubles_quotes() {
        assert_eq!(escape_literal("it's"), "it''s");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_an_error() {
        let store = in_memory_store().await;

        let outcome = run_command(
            &store,
            Command::Get {
                key: "missing".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome, Outcome::NotFound);

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_then_get_finds_key() {
        let store = in_memory_store().await;

        let outcome = run_command(
            &store,
            Command::Set {
                key: "theme".to_string(),
                value: "dark".to_string(),
                username: Some("admin".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome, Outcome::Done);

        let outcome = run_command(
            &store,
            Command::Get {
                key: "theme".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome, Outcome::Done);

        store.shutdown().await.unwrap();
    }
}
