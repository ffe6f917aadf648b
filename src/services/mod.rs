pub mod ai_service;
pub mod auth_service;
pub mod fallback_scheduler;
pub mod prompt_templates;
pub mod schedule_service;
pub mod suggestion_service;
pub mod task_service;
pub mod user_service;

use crate::error::{AppError, AppResult};

/// Runs synchronous store work on the blocking pool.
pub(crate) async fn blocking<T: Send + 'static>(
    task: impl FnOnce() -> AppResult<T> + Send + 'static,
) -> AppResult<T> {
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AppError::other(format!("background task failed: {err}")))?
}
