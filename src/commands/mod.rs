pub mod ai;
pub mod auth;
pub mod premium;
pub mod task;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::error::{AiErrorCode, AppError, AppResult};
use crate::models::user::Session;
use crate::services::ai_service::AiService;
use crate::services::auth_service::AuthService;
use crate::services::blocking;
use crate::services::schedule_service::ScheduleService;
use crate::services::suggestion_service::SuggestionService;
use crate::services::task_service::TaskService;
use crate::services::user_service::UserService;
use crate::utils::crypto::PasswordHasher;

/// Shared handles for every command. Cloning is cheap; each service is
/// behind an `Arc` and the pool only carries a path.
#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    task_service: Arc<TaskService>,
    ai_service: Arc<AiService>,
    user_service: Arc<UserService>,
    auth_service: Arc<AuthService>,
    schedule_service: Arc<ScheduleService>,
    suggestion_service: Arc<SuggestionService>,
}

impl AppState {
    /// Installs logging, opens the database and wires the services.
    pub fn bootstrap(config: &AppConfig) -> AppResult<Self> {
        crate::utils::logger::init_logging(&config.log_dir())?;
        let pool = DbPool::new(config.database_path())?;
        let state = Self::new(config, pool)?;
        state.auth_service.purge_expired_tokens()?;
        info!(
            target: "app::command",
            data_dir = %config.data_dir.display(),
            ai_configured = state.ai_service.is_configured(),
            "application state ready"
        );
        Ok(state)
    }

    pub fn new(config: &AppConfig, db_pool: DbPool) -> AppResult<Self> {
        let ai_service = Arc::new(AiService::new(&config.ai)?);
        Ok(Self::with_ai_service(config, db_pool, ai_service))
    }

    pub fn with_ai_service(config: &AppConfig, db_pool: DbPool, ai_service: Arc<AiService>) -> Self {
        let task_service = Arc::new(TaskService::new(db_pool.clone()));
        let user_service = Arc::new(UserService::new(
            db_pool.clone(),
            PasswordHasher::new(config.password_iterations),
        ));
        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            Arc::clone(&user_service),
            config.token_ttl,
        ));
        let schedule_service = Arc::new(ScheduleService::new(
            Arc::clone(&task_service),
            Arc::clone(&ai_service),
        ));
        let suggestion_service = Arc::new(SuggestionService::new(
            Arc::clone(&task_service),
            Arc::clone(&ai_service),
        ));

        Self {
            db_pool,
            task_service,
            ai_service,
            user_service,
            auth_service,
            schedule_service,
            suggestion_service,
        }
    }

    pub fn tasks(&self) -> Arc<TaskService> {
        Arc::clone(&self.task_service)
    }

    pub fn ai(&self) -> Arc<AiService> {
        Arc::clone(&self.ai_service)
    }

    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.user_service)
    }

    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth_service)
    }

    pub fn schedule(&self) -> Arc<ScheduleService> {
        Arc::clone(&self.schedule_service)
    }

    pub fn suggestions(&self) -> Arc<SuggestionService> {
        Arc::clone(&self.suggestion_service)
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub success: bool,
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Error payload handed back to the transport. `status` is the HTTP status a
/// web front would answer with and is not part of the JSON body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
    #[serde(skip)]
    pub status: u16,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
            status: 500,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation { message, details } => {
                CommandError::new("VALIDATION_ERROR", message, details).with_status(400)
            }
            AppError::NotFound => {
                CommandError::new("NOT_FOUND", "Resource not found", None).with_status(404)
            }
            AppError::Conflict { message } => {
                CommandError::new("CONFLICT", message, None).with_status(409)
            }
            AppError::Unauthorized { message } => {
                CommandError::new("UNAUTHORIZED", message, None).with_status(401)
            }
            AppError::QuotaExceeded { message } => {
                CommandError::new("QUOTA_EXCEEDED", message, None).with_status(403)
            }
            AppError::NothingToSchedule => CommandError::new(
                "NOTHING_TO_SCHEDULE",
                "No incomplete tasks to schedule",
                None,
            )
            .with_status(400),
            AppError::Ai {
                code,
                message,
                correlation_id,
                details,
            } => {
                let mut merged = JsonMap::new();
                if let Some(existing) = details {
                    match existing {
                        JsonValue::Object(map) => merged.extend(map),
                        value => {
                            merged.insert("info".to_string(), value);
                        }
                    }
                }
                if let Some(id) = correlation_id {
                    merged.insert("correlationId".to_string(), JsonValue::String(id));
                }
                let detail_value = if merged.is_empty() {
                    None
                } else {
                    Some(JsonValue::Object(merged))
                };
                warn!(target: "app::command", code = %code, %message, "ai failure in command");
                CommandError::new(code.as_str(), message, detail_value)
                    .with_status(ai_status(code))
            }
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("UNKNOWN", "Internal server error", None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", "Serialization failed", None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", "File system access failed", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}

fn ai_status(code: AiErrorCode) -> u16 {
    match code {
        AiErrorCode::HttpTimeout => 504,
        AiErrorCode::MissingApiKey | AiErrorCode::Unknown => 500,
        _ => 502,
    }
}

pub(crate) async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> Result<T, AppError> + Send + 'static,
) -> CommandResult<T> {
    blocking(task).await.map_err(CommandError::from)
}

/// Resolves the bearer token of an authenticated command.
pub(crate) async fn authorize(state: &AppState, token: &str) -> CommandResult<Session> {
    let auth = state.auth();
    let token = token.to_string();
    run_blocking(move || auth.authenticate(&token)).await
}
