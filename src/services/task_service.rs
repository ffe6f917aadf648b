use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::config::{DESCRIPTION_MAX_CHARS, FREE_SUGGESTION_LIMIT, TITLE_MAX_CHARS};
use crate::db::repositories::task_repository::{SuggestionWrite, TaskRepository, TaskRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::task::{
    TaskCreateInput, TaskPriority, TaskRecord, TaskStatus, TaskUpdateInput,
};
use crate::models::user::UserProfile;

pub(crate) const SUGGESTION_CONFLICT: &str = "Task already has an AI suggestion";
pub(crate) const SUGGESTION_LIMIT_REACHED: &str =
    "AI suggestion limit reached. Upgrade to premium for unlimited suggestions.";

/// Owner-scoped task store. A task that exists but belongs to someone else
/// is reported as not found.
#[derive(Clone)]
pub struct TaskService {
    db: DbPool,
}

impl TaskService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_task(&self, owner: &UserProfile, input: TaskCreateInput) -> AppResult<TaskRecord> {
        let record = build_record_from_create(owner, input)?;
        let row = TaskRow::from_record(&record);
        self.db
            .with_connection(|conn| TaskRepository::insert(conn, &row))?;
        info!(task_id = %record.id, user_id = %owner.id, "task created");
        Ok(record)
    }

    pub fn update_task(
        &self,
        owner: &UserProfile,
        id: &str,
        update: TaskUpdateInput,
    ) -> AppResult<TaskRecord> {
        let mut existing = self.get_task(owner, id)?;
        apply_update(&mut existing, update)?;

        let row = TaskRow::from_record(&existing);
        self.db
            .with_connection(|conn| TaskRepository::update(conn, &row))?;
        info!(task_id = %existing.id, "task updated");
        Ok(existing)
    }

    pub fn delete_task(&self, owner: &UserProfile, id: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| TaskRepository::delete(conn, id, &owner.id))?;
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    pub fn get_task(&self, owner: &UserProfile, id: &str) -> AppResult<TaskRecord> {
        let row = self
            .db
            .with_connection(|conn| TaskRepository::find_by_id(conn, id))?
            .filter(|row| row.user_id == owner.id)
            .ok_or_else(AppError::not_found)?;
        let record = row.into_record()?;
        debug!(task_id = %record.id, "task fetched");
        Ok(record)
    }

    pub fn list_tasks(&self, owner: &UserProfile) -> AppResult<Vec<TaskRecord>> {
        let rows = self
            .db
            .with_connection(|conn| TaskRepository::list_by_user(conn, &owner.id))?;
        let tasks = rows
            .into_iter()
            .map(|row| row.into_record())
            .collect::<AppResult<Vec<_>>>()?;
        debug!(count = tasks.len(), user_id = %owner.id, "tasks listed");
        Ok(tasks)
    }

    pub fn list_incomplete_tasks(&self, owner: &UserProfile) -> AppResult<Vec<TaskRecord>> {
        let tasks = self
            .list_tasks(owner)?
            .into_iter()
            .filter(TaskRecord::is_incomplete)
            .collect();
        Ok(tasks)
    }

    /// Number of the owner's tasks that already carry an AI suggestion.
    pub fn count_suggestions(&self, owner: &UserProfile) -> AppResult<usize> {
        self.db
            .with_connection(|conn| TaskRepository::count_with_suggestion(conn, &owner.id))
    }

    /// Stores the suggestion unless one is already present. Free owners are
    /// held to [`FREE_SUGGESTION_LIMIT`] in the same write.
    pub fn store_suggestion(
        &self,
        owner: &UserProfile,
        id: &str,
        suggestion: &str,
    ) -> AppResult<TaskRecord> {
        let quota = (!owner.is_premium).then_some(FREE_SUGGESTION_LIMIT);
        let outcome = self.db.with_connection(|conn| {
            TaskRepository::store_suggestion(conn, id, &owner.id, suggestion, quota)
        })?;
        match outcome {
            SuggestionWrite::Stored => {
                info!(task_id = %id, "ai suggestion stored");
                self.get_task(owner, id)
            }
            SuggestionWrite::AlreadySuggested => Err(AppError::conflict(SUGGESTION_CONFLICT)),
            SuggestionWrite::QuotaReached => Err(AppError::quota_exceeded(SUGGESTION_LIMIT_REACHED)),
            SuggestionWrite::Missing => Err(AppError::not_found()),
        }
    }
}

fn build_record_from_create(owner: &UserProfile, mut input: TaskCreateInput) -> AppResult<TaskRecord> {
    Ok(TaskRecord {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: owner.id.clone(),
        title: normalize_title(&input.title)?,
        description: normalize_description(input.description.take())?,
        deadline: normalize_deadline(input.deadline.take())?,
        priority: normalize_priority(input.priority.take())?,
        status: normalize_status(input.status.take())?,
        ai_suggestion: None,
        created_at: Utc::now(),
    })
}

fn apply_update(record: &mut TaskRecord, update: TaskUpdateInput) -> AppResult<()> {
    if let Some(title) = update.title {
        record.title = normalize_title(&title)?;
    }

    if let Some(description) = update.description {
        record.description = normalize_description(description)?;
    }

    if let Some(deadline) = update.deadline {
        record.deadline = normalize_deadline(deadline)?;
    }

    if let Some(priority) = update.priority {
        record.priority = normalize_priority(Some(priority))?;
    }

    if let Some(status) = update.status {
        record.status = normalize_status(Some(status))?;
    }

    Ok(())
}

fn normalize_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(AppError::validation(format!(
            "title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_description(value: Option<String>) -> AppResult<Option<String>> {
    let value = normalize_optional_string(value);
    if let Some(text) = &value {
        if text.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(AppError::validation(format!(
                "description must be at most {DESCRIPTION_MAX_CHARS} characters"
            )));
        }
    }
    Ok(value)
}

fn normalize_priority(priority: Option<String>) -> AppResult<TaskPriority> {
    match normalize_optional_string(priority) {
        Some(value) => value.parse(),
        None => Ok(TaskPriority::default()),
    }
}

fn normalize_status(status: Option<String>) -> AppResult<TaskStatus> {
    match normalize_optional_string(status) {
        Some(value) => value.parse(),
        None => Ok(TaskStatus::default()),
    }
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|val| {
        let trimmed = val.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC). Blank clears.
fn normalize_deadline(value: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    let Some(value) = normalize_optional_string(value) else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| AppError::validation("Invalid date"))
}
