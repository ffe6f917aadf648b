use serde::Serialize;
use tracing::debug;

use crate::models::task::{TaskCreateInput, TaskRecord, TaskUpdateInput};

use super::{authorize, run_blocking, AppState, CommandResult, SuccessResponse};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub task: TaskRecord,
}

pub async fn tasks_list(state: &AppState, token: &str) -> CommandResult<TaskListResponse> {
    let session = authorize(state, token).await?;
    let tasks = state.tasks();
    let records = run_blocking(move || tasks.list_tasks(&session.user)).await?;
    debug!(target: "app::command", count = records.len(), "tasks_list invoked");
    Ok(TaskListResponse { tasks: records })
}

pub async fn tasks_create(
    state: &AppState,
    token: &str,
    payload: TaskCreateInput,
) -> CommandResult<TaskResponse> {
    let session = authorize(state, token).await?;
    let tasks = state.tasks();
    let task = run_blocking(move || tasks.create_task(&session.user, payload)).await?;
    Ok(TaskResponse { task })
}

pub async fn tasks_update(
    state: &AppState,
    token: &str,
    id: String,
    payload: TaskUpdateInput,
) -> CommandResult<TaskResponse> {
    let session = authorize(state, token).await?;
    let tasks = state.tasks();
    let task = run_blocking(move || tasks.update_task(&session.user, &id, payload)).await?;
    Ok(TaskResponse { task })
}

pub async fn tasks_delete(
    state: &AppState,
    token: &str,
    id: String,
) -> CommandResult<SuccessResponse> {
    let session = authorize(state, token).await?;
    let tasks = state.tasks();
    run_blocking(move || tasks.delete_task(&session.user, &id)).await?;
    Ok(SuccessResponse { success: true })
}
