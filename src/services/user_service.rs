use chrono::Utc;
use tracing::{debug, info};

use crate::db::repositories::user_repository::{UserRepository, UserRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::user::{SignupInput, UserRecord};
use crate::utils::crypto::PasswordHasher;

const NAME_MAX_CHARS: usize = 100;
const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Clone)]
pub struct UserService {
    db: DbPool,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(db: DbPool, hasher: PasswordHasher) -> Self {
        Self { db, hasher }
    }

    pub fn create_user(&self, input: SignupInput) -> AppResult<UserRecord> {
        let name = normalize_name(&input.name)?;
        let email = normalize_email(&input.email)?;
        validate_password(&input.password)?;

        if self.find_by_email(&email)?.is_some() {
            return Err(AppError::conflict("User already exists"));
        }

        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            password_hash: Some(self.hasher.hash(&input.password)),
            is_premium: false,
            created_at: Utc::now(),
        };

        let row = UserRow::from_record(&record);
        self.db
            .with_connection(|conn| UserRepository::insert(conn, &row))?;
        info!(target: "app::auth", user_id = %record.id, "user created");
        Ok(record)
    }

    pub fn get_user(&self, id: &str) -> AppResult<UserRecord> {
        let row = self
            .db
            .with_connection(|conn| UserRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)?;
        row.into_record()
    }

    pub fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let email = email.trim().to_lowercase();
        let row = self
            .db
            .with_connection(|conn| UserRepository::find_by_email(conn, &email))?;
        row.map(UserRow::into_record).transpose()
    }

    /// Checks a password against the stored hash. Users without a password
    /// never verify.
    pub fn verify_password(&self, user: &UserRecord, password: &str) -> AppResult<bool> {
        match &user.password_hash {
            Some(encoded) => self.hasher.verify(password, encoded),
            None => Ok(false),
        }
    }

    pub fn change_password(&self, user_id: &str, password: &str) -> AppResult<()> {
        validate_password(password)?;
        let encoded = self.hasher.hash(password);
        self.db
            .with_connection(|conn| UserRepository::update_password_hash(conn, user_id, &encoded))?;
        info!(target: "app::auth", user_id, "password changed");
        Ok(())
    }

    pub fn set_premium(&self, user_id: &str, is_premium: bool) -> AppResult<UserRecord> {
        self.db
            .with_connection(|conn| UserRepository::set_premium(conn, user_id, is_premium))?;
        info!(target: "app::auth", user_id, is_premium, "premium flag updated");
        self.get_user(user_id)
    }

    /// Removes the user together with every task and token they own.
    pub fn delete_user(&self, user_id: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| UserRepository::delete(conn, user_id))?;
        debug!(target: "app::auth", user_id, "user deleted");
        Ok(())
    }
}

fn normalize_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if trimmed.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::validation(format!(
            "name must be at most {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_email(email: &str) -> AppResult<String> {
    let normalized = email.trim().to_lowercase();
    let valid = normalized
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid {
        return Err(AppError::validation("email address is invalid"));
    }
    Ok(normalized)
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(AppError::validation(format!(
            "password must be at least {PASSWORD_MIN_CHARS} characters"
        )));
    }
    Ok(())
}
