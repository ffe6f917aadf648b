use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::FREE_SCHEDULE_LIMIT;
use crate::error::{AppError, AppResult};
use crate::models::schedule::{ExternalScheduleItem, ScheduleEntry, ScheduleResponse, ScheduleSource};
use crate::models::task::{TaskPriority, TaskRecord};
use crate::models::user::UserProfile;
use crate::services::ai_service::AiService;
use crate::services::blocking;
use crate::services::fallback_scheduler::{fallback_schedule, time_slot, DEFAULT_DURATION};
use crate::services::task_service::TaskService;

const UNKNOWN_TASK_TITLE: &str = "Unknown Task";

/// Builds a day plan for an owner's incomplete tasks. Generation is
/// delegated to the AI service; any failure there degrades to the
/// deterministic ordering instead of failing the request.
#[derive(Clone)]
pub struct ScheduleService {
    task_service: Arc<TaskService>,
    ai_service: Arc<AiService>,
}

impl ScheduleService {
    pub fn new(task_service: Arc<TaskService>, ai_service: Arc<AiService>) -> Self {
        Self {
            task_service,
            ai_service,
        }
    }

    pub async fn generate(&self, owner: &UserProfile) -> AppResult<ScheduleResponse> {
        let incomplete = {
            let tasks = Arc::clone(&self.task_service);
            let owner = owner.clone();
            blocking(move || tasks.list_incomplete_tasks(&owner)).await?
        };

        if incomplete.is_empty() {
            return Err(AppError::nothing_to_schedule());
        }

        if !owner.is_premium && incomplete.len() > FREE_SCHEDULE_LIMIT {
            return Err(AppError::quota_exceeded(format!(
                "Free users can schedule up to {FREE_SCHEDULE_LIMIT} tasks. Upgrade to premium for unlimited scheduling."
            )));
        }

        info!(
            target: "app::schedule",
            user_id = %owner.id,
            task_count = incomplete.len(),
            "generating schedule"
        );

        let (schedule, source) = match self.ai_service.schedule_items(&incomplete).await {
            Ok(items) => (reconcile(&items, &incomplete), ScheduleSource::Ai),
            Err(error) => {
                warn!(
                    target: "app::schedule",
                    user_id = %owner.id,
                    error = %error,
                    code = ?error.ai_code(),
                    "AI schedule unavailable, using fallback ordering"
                );
                (fallback_schedule(&incomplete), ScheduleSource::Fallback)
            }
        };

        debug!(
            target: "app::schedule",
            entries = schedule.len(),
            source = ?source,
            "schedule ready"
        );

        Ok(ScheduleResponse {
            schedule,
            total_tasks: incomplete.len(),
            generated_at: Utc::now(),
            source,
        })
    }
}

/// Maps external items back onto known tasks and fills in missing fields.
///
/// Matching per item, first hit wins in list order: exact title, then
/// case-insensitive containment in either direction, then the task at the
/// same position. Unmatched items are kept under their own title with a
/// synthesized id.
pub fn reconcile(items: &[ExternalScheduleItem], tasks: &[TaskRecord]) -> Vec<ScheduleEntry> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let matched = match_task(item.task_title.as_deref(), index, tasks);

            let priority = item
                .priority
                .as_deref()
                .and_then(|value| value.parse::<TaskPriority>().ok())
                .or(matched.map(|task| task.priority))
                .unwrap_or_default();

            let title = match (matched, item.task_title.as_deref()) {
                (Some(task), _) => task.title.clone(),
                (None, Some(title)) => title.to_string(),
                (None, None) => UNKNOWN_TASK_TITLE.to_string(),
            };

            ScheduleEntry {
                task_id: matched
                    .map(|task| task.id.clone())
                    .unwrap_or_else(|| format!("ai-{}", index + 1)),
                title,
                priority,
                deadline: matched.and_then(|task| task.deadline),
                estimated_duration: item
                    .estimated_duration
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DURATION.to_string()),
                suggested_time_slot: item
                    .suggested_time_slot
                    .clone()
                    .unwrap_or_else(|| time_slot(index)),
                reasoning: item.reasoning.clone().unwrap_or_else(|| {
                    format!("{priority} priority task scheduled for optimal productivity")
                }),
            }
        })
        .collect()
}

fn match_task<'a>(
    title: Option<&str>,
    index: usize,
    tasks: &'a [TaskRecord],
) -> Option<&'a TaskRecord> {
    let by_title = title.and_then(|title| {
        tasks.iter().find(|task| task.title == title).or_else(|| {
            let needle = title.to_lowercase();
            tasks.iter().find(|task| {
                let candidate = task.title.to_lowercase();
                candidate.contains(&needle) || needle.contains(&candidate)
            })
        })
    });

    by_title.or_else(|| tasks.get(index))
}
