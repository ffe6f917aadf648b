use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::{debug, info};

use crate::db::repositories::token_repository::{TokenRepository, TokenRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::user::{AuthResponse, LoginInput, Session, SignupInput, UserRecord};
use crate::services::user_service::UserService;
use crate::utils::crypto::{generate_token, token_digest};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_TOKEN: &str = "Invalid token";

/// Issues and resolves bearer tokens. A token maps to exactly one
/// [`Session`]; logging out deletes it.
#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
    users: Arc<UserService>,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(db: DbPool, users: Arc<UserService>, token_ttl: Duration) -> Self {
        Self {
            db,
            users,
            token_ttl,
        }
    }

    pub fn signup(&self, input: SignupInput) -> AppResult<AuthResponse> {
        let user = self.users.create_user(input)?;
        let token = self.issue_token(&user)?;
        Ok(AuthResponse {
            user: user.profile(),
            token,
        })
    }

    pub fn login(&self, input: LoginInput) -> AppResult<AuthResponse> {
        if input.email.trim().is_empty() || input.password.is_empty() {
            return Err(AppError::validation("Email and password required"));
        }

        let user = self
            .users
            .find_by_email(&input.email)?
            .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

        if !self.users.verify_password(&user, &input.password)? {
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        let token = self.issue_token(&user)?;
        info!(target: "app::auth", user_id = %user.id, "user logged in");
        Ok(AuthResponse {
            user: user.profile(),
            token,
        })
    }

    /// Loads the session behind a bearer token. The user is re-read so
    /// premium changes apply immediately.
    pub fn authenticate(&self, token: &str) -> AppResult<Session> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::unauthorized("Access token required"));
        }

        let digest = token_digest(token);
        let row = self
            .db
            .with_connection(|conn| TokenRepository::find(conn, &digest))?
            .ok_or_else(|| AppError::unauthorized(INVALID_TOKEN))?;

        let expires_at = DateTime::parse_from_rfc3339(&row.expires_at)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|_| AppError::unauthorized(INVALID_TOKEN))?;
        if expires_at <= Utc::now() {
            self.db
                .with_connection(|conn| TokenRepository::delete(conn, &digest))?;
            return Err(AppError::unauthorized("Token expired"));
        }

        let user = match self.users.get_user(&row.user_id) {
            Ok(user) => user,
            Err(AppError::NotFound) => return Err(AppError::unauthorized(INVALID_TOKEN)),
            Err(error) => return Err(error),
        };

        debug!(target: "app::auth", user_id = %user.id, "session loaded");
        Ok(Session {
            token: token.to_string(),
            user: user.profile(),
            expires_at,
        })
    }

    /// Clears the session. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) -> AppResult<()> {
        let digest = token_digest(token.trim());
        let removed = self
            .db
            .with_connection(|conn| TokenRepository::delete(conn, &digest))?;
        debug!(target: "app::auth", removed, "session cleared");
        Ok(())
    }

    pub fn purge_expired_tokens(&self) -> AppResult<usize> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let purged = self
            .db
            .with_connection(|conn| TokenRepository::purge_expired(conn, &now))?;
        if purged > 0 {
            info!(target: "app::auth", purged, "expired tokens purged");
        }
        Ok(purged)
    }

    fn issue_token(&self, user: &UserRecord) -> AppResult<String> {
        let token = generate_token();
        let now = Utc::now();
        let row = TokenRow {
            token_hash: token_digest(&token),
            user_id: user.id.clone(),
            created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            expires_at: (now + self.token_ttl).to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        self.db
            .with_connection(|conn| TokenRepository::insert(conn, &row))?;
        Ok(token)
    }
}
