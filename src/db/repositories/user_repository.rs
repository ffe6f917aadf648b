use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::user::UserRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        name,
        email,
        password_hash,
        is_premium,
        created_at
    FROM users
"#;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub is_premium: bool,
    pub created_at: String,
}

impl UserRow {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            password_hash: record.password_hash.clone(),
            is_premium: record.is_premium,
            created_at: record.created_at.to_rfc3339(),
        }
    }

    pub fn into_record(self) -> AppResult<UserRecord> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|err| AppError::database(format!("stored timestamp is not RFC 3339: {err}")))?;

        Ok(UserRecord {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            is_premium: self.is_premium,
            created_at,
        })
    }
}

impl TryFrom<&Row<'_>> for UserRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(UserRow {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            is_premium: row.get::<_, i64>("is_premium")? != 0,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct UserRepository;

impl UserRepository {
    pub fn insert(conn: &Connection, row: &UserRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO users (id, name, email, password_hash, is_premium, created_at)
                VALUES (:id, :name, :email, :password_hash, :is_premium, :created_at)
            "#,
            named_params! {
                ":id": &row.id,
                ":name": &row.name,
                ":email": &row.email,
                ":password_hash": &row.password_hash,
                ":is_premium": row.is_premium as i64,
                ":created_at": &row.created_at,
            },
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<UserRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| UserRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<UserRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE email = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([email], |row| UserRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn set_premium(conn: &Connection, id: &str, is_premium: bool) -> AppResult<()> {
        let affected = conn.execute(
            "UPDATE users SET is_premium = ?1 WHERE id = ?2",
            (is_premium as i64, id),
        )?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn update_password_hash(conn: &Connection, id: &str, password_hash: &str) -> AppResult<()> {
        let affected = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            (password_hash, id),
        )?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    /// Owned tasks and tokens go with the user through `ON DELETE CASCADE`.
    pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }
}
