use tracing::info;

use super::auth::UserResponse;
use super::{authorize, run_blocking, AppState, CommandResult};

/// Flips the caller to premium. Payment verification happens elsewhere;
/// this only records the outcome.
pub async fn premium_activate(state: &AppState, token: &str) -> CommandResult<UserResponse> {
    let session = authorize(state, token).await?;
    let users = state.users();
    let user_id = session.user.id.clone();
    let user = run_blocking(move || users.set_premium(&user_id, true)).await?;
    info!(target: "app::command", user_id = %user.id, "premium activated");
    Ok(UserResponse {
        user: user.profile(),
    })
}
