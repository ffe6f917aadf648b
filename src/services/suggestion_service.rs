use std::sync::Arc;

use tracing::info;

use crate::config::FREE_SUGGESTION_LIMIT;
use crate::error::{AppError, AppResult};
use crate::models::schedule::SuggestionRequest;
use crate::models::task::TaskRecord;
use crate::models::user::UserProfile;
use crate::services::ai_service::AiService;
use crate::services::blocking;
use crate::services::task_service::{TaskService, SUGGESTION_CONFLICT, SUGGESTION_LIMIT_REACHED};

/// One-time AI enrichment of a task. Unlike scheduling there is no local
/// fallback, so generation failures reach the caller.
#[derive(Clone)]
pub struct SuggestionService {
    task_service: Arc<TaskService>,
    ai_service: Arc<AiService>,
}

impl SuggestionService {
    pub fn new(task_service: Arc<TaskService>, ai_service: Arc<AiService>) -> Self {
        Self {
            task_service,
            ai_service,
        }
    }

    pub async fn generate(
        &self,
        owner: &UserProfile,
        request: SuggestionRequest,
    ) -> AppResult<TaskRecord> {
        let task_id = request.task_id.trim();
        if task_id.is_empty() {
            return Err(AppError::validation("Task ID is required"));
        }

        let task = {
            let this = self.clone();
            let owner = owner.clone();
            let task_id = task_id.to_string();
            blocking(move || this.check_gate(&owner, &task_id)).await?
        };

        let suggestion = self.ai_service.suggest_for_task(&task).await?;

        let updated = {
            let tasks = Arc::clone(&self.task_service);
            let owner = owner.clone();
            blocking(move || tasks.store_suggestion(&owner, &task.id, &suggestion)).await?
        };
        info!(
            target: "app::ai",
            task_id = %updated.id,
            user_id = %owner.id,
            "suggestion generated"
        );
        Ok(updated)
    }

    /// Preconditions for generating a suggestion, checked before any
    /// external call: ownership, one suggestion per task, and the free quota
    /// counted as tasks that already carry a suggestion. The store re-checks
    /// the last two when writing.
    pub fn check_gate(&self, owner: &UserProfile, task_id: &str) -> AppResult<TaskRecord> {
        let task = self.task_service.get_task(owner, task_id)?;

        if task.has_suggestion() {
            return Err(AppError::conflict(SUGGESTION_CONFLICT));
        }

        if !owner.is_premium {
            let used = self.task_service.count_suggestions(owner)?;
            if used >= FREE_SUGGESTION_LIMIT {
                return Err(AppError::quota_exceeded(SUGGESTION_LIMIT_REACHED));
            }
        }

        Ok(task)
    }
}
