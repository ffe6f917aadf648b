use tracing::debug;

use crate::models::schedule::{ScheduleResponse, SuggestionRequest};

use super::task::TaskResponse;
use super::{authorize, AppState, CommandError, CommandResult};

pub async fn tasks_generate_suggestion(
    state: &AppState,
    token: &str,
    request: SuggestionRequest,
) -> CommandResult<TaskResponse> {
    let session = authorize(state, token).await?;
    debug!(
        target: "app::command",
        task_id = %request.task_id,
        "tasks_generate_suggestion invoked"
    );
    let task = state
        .suggestions()
        .generate(&session.user, request)
        .await
        .map_err(CommandError::from)?;
    Ok(TaskResponse { task })
}

pub async fn schedule_generate(state: &AppState, token: &str) -> CommandResult<ScheduleResponse> {
    let session = authorize(state, token).await?;
    debug!(target: "app::command", user_id = %session.user.id, "schedule_generate invoked");
    state
        .schedule()
        .generate(&session.user)
        .await
        .map_err(CommandError::from)
}
