use serde::Serialize;
use tracing::debug;

use crate::models::user::{AuthResponse, LoginInput, SignupInput, UserProfile};

use super::{authorize, run_blocking, AppState, CommandResult, SuccessResponse};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user: UserProfile,
}

pub async fn auth_signup(state: &AppState, payload: SignupInput) -> CommandResult<AuthResponse> {
    let auth = state.auth();
    run_blocking(move || auth.signup(payload)).await
}

pub async fn auth_login(state: &AppState, payload: LoginInput) -> CommandResult<AuthResponse> {
    let auth = state.auth();
    run_blocking(move || auth.login(payload)).await
}

pub async fn auth_me(state: &AppState, token: &str) -> CommandResult<UserResponse> {
    let session = authorize(state, token).await?;
    debug!(target: "app::command", user_id = %session.user.id, "auth_me invoked");
    Ok(UserResponse { user: session.user })
}

pub async fn auth_logout(state: &AppState, token: &str) -> CommandResult<SuccessResponse> {
    let session = authorize(state, token).await?;
    let auth = state.auth();
    run_blocking(move || auth.logout(&session.token)).await?;
    Ok(SuccessResponse { success: true })
}
