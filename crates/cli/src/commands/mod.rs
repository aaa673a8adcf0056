pub mod config;
pub mod doctor;
pub mod migrate;
pub mod price;
pub mod products;
pub mod quotes;
pub mod report;
pub mod seed;
pub mod transition;

use quotedesk_core::config::{AppConfig, LoadOptions};
use quotedesk_core::errors::{ApplicationError, ErrorKind, InterfaceError};
use quotedesk_core::session::{Role, Session, UserDirectory};
use quotedesk_db::{connect_with_settings, migrations, sql_quote_desk, DbPool, SqlQuoteDesk};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_inner(command, message.into(), None)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        Self::success_inner(command, message.into(), Some(data))
    }

    fn success_inner(command: &str, message: String, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message,
            user_message: None,
            correlation_id: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::from_failure(command, Failure::new(error_class, message, exit_code))
    }

    fn from_failure(command: &str, failure: Failure) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(failure.error_class),
            message: failure.message,
            user_message: failure.interface.as_ref().map(|error| error.user_message().to_string()),
            correlation_id: failure.interface.as_ref().map(|error| error.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code: failure.exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Why a command stopped. Service errors also carry their interface mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub error_class: String,
    pub message: String,
    pub exit_code: u8,
    pub interface: Option<InterfaceError>,
}

impl Failure {
    pub fn new(error_class: &str, message: impl Into<String>, exit_code: u8) -> Self {
        Self {
            error_class: error_class.to_string(),
            message: message.into(),
            exit_code,
            interface: None,
        }
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Runs `body` on a fresh current-thread runtime after loading config.
pub(crate) fn execute<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(AppConfig) -> Fut,
    Fut: std::future::Future<Output = Result<CommandResult, Failure>>,
{
    let config = match load_config(command) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    match runtime.block_on(body(config)) {
        Ok(result) => {
            info!(event_name = "cli.command.completed", command, "command completed");
            result
        }
        Err(failure) => {
            warn!(
                event_name = "cli.command.failed",
                command,
                error_class = %failure.error_class,
                exit_code = failure.exit_code,
                correlation_id = failure.interface.as_ref().map(InterfaceError::correlation_id),
                "command failed"
            );
            CommandResult::from_failure(command, failure)
        }
    }
}

pub(crate) async fn connect(config: &AppConfig) -> Result<DbPool, Failure> {
    // Every connection to `:memory:` opens a separate database.
    let max_connections = if config.database.url.contains(":memory:") {
        1
    } else {
        config.database.max_connections
    };

    connect_with_settings(&config.database.url, max_connections, config.database.timeout_secs)
        .await
        .map_err(|error| Failure::new("db_connectivity", error.to_string(), 4))
}

/// Connects, applies pending migrations, and wires the application service.
pub(crate) async fn open_desk(config: &AppConfig) -> Result<(DbPool, SqlQuoteDesk), Failure> {
    let pool = connect(config).await?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| Failure::new("migration", error.to_string(), 5))?;
    let desk = sql_quote_desk(pool.clone(), config);
    Ok((pool, desk))
}

pub(crate) fn session_for(role: Role) -> Result<Session, Failure> {
    UserDirectory::demo().switch_role(role).map_err(|error| application_failure(error.into()))
}

/// Classifies a service error and tags it with a fresh correlation id.
pub(crate) fn application_failure(error: ApplicationError) -> Failure {
    let (error_class, exit_code) = match error.kind() {
        Some(ErrorKind::InvalidInput) => ("invalid_input", 6),
        Some(ErrorKind::ReferentialIntegrity) => ("referential_integrity", 6),
        Some(ErrorKind::InvalidTransition) => ("invalid_transition", 6),
        None => match &error {
            ApplicationError::Configuration(_) => ("config_validation", 2),
            _ => ("persistence", 4),
        },
    };
    let message = error.to_string();
    Failure {
        interface: Some(error.into_interface(Uuid::new_v4().to_string())),
        ..Failure::new(error_class, message, exit_code)
    }
}

pub(crate) fn to_data<T: Serialize>(value: &T) -> Result<Value, Failure> {
    serde_json::to_value(value).map_err(|error| Failure::new("serialization", error.to_string(), 3))
}
