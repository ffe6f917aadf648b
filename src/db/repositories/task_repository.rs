use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::task::TaskRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        user_id,
        title,
        description,
        deadline,
        priority,
        status,
        ai_suggestion,
        created_at
    FROM tasks
"#;

/// SQL form of [`TaskRecord::has_suggestion`]: blank text counts as absent.
const HAS_SUGGESTION: &str = "(ai_suggestion IS NOT NULL AND TRIM(ai_suggestion) <> '')";

/// Result of a guarded suggestion write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionWrite {
    Stored,
    AlreadySuggested,
    QuotaReached,
    Missing,
}

/// Column-level view of a task; timestamps stay RFC 3339 text.
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub priority: String,
    pub status: String,
    pub ai_suggestion: Option<String>,
    pub created_at: String,
}

impl TaskRow {
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            user_id: record.user_id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            deadline: record.deadline.map(|value| value.to_rfc3339()),
            priority: record.priority.as_str().to_string(),
            status: record.status.as_str().to_string(),
            ai_suggestion: record.ai_suggestion.clone(),
            created_at: record.created_at.to_rfc3339(),
        }
    }

    pub fn into_record(self) -> AppResult<TaskRecord> {
        Ok(TaskRecord {
            priority: self.priority.parse()?,
            status: self.status.parse()?,
            deadline: self.deadline.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            ai_suggestion: self.ai_suggestion,
        })
    }
}

impl TryFrom<&Row<'_>> for TaskRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(TaskRow {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            deadline: row.get("deadline")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            ai_suggestion: row.get("ai_suggestion")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct TaskRepository;

impl TaskRepository {
    pub fn insert(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id,
                    user_id,
                    title,
                    description,
                    deadline,
                    priority,
                    status,
                    ai_suggestion,
                    created_at
                ) VALUES (
                    :id,
                    :user_id,
                    :title,
                    :description,
                    :deadline,
                    :priority,
                    :status,
                    :ai_suggestion,
                    :created_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":user_id": &row.user_id,
                ":title": &row.title,
                ":description": &row.description,
                ":deadline": &row.deadline,
                ":priority": &row.priority,
                ":status": &row.status,
                ":ai_suggestion": &row.ai_suggestion,
                ":created_at": &row.created_at,
            },
        )?;

        Ok(())
    }

    /// Writes the mutable columns. `user_id`, `created_at` and
    /// `ai_suggestion` are never touched here.
    pub fn update(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE tasks SET
                    title = :title,
                    description = :description,
                    deadline = :deadline,
                    priority = :priority,
                    status = :status
                WHERE id = :id AND user_id = :user_id
            "#,
            named_params! {
                ":id": &row.id,
                ":user_id": &row.user_id,
                ":title": &row.title,
                ":description": &row.description,
                ":deadline": &row.deadline,
                ":priority": &row.priority,
                ":status": &row.status,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    /// Sets the suggestion if the task has none yet and, when `quota` is
    /// given, the owner holds fewer than `quota` suggestions. Both guards are
    /// part of the one UPDATE, so concurrent writers cannot overshoot.
    pub fn store_suggestion(
        conn: &Connection,
        id: &str,
        user_id: &str,
        suggestion: &str,
        quota: Option<usize>,
    ) -> AppResult<SuggestionWrite> {
        let sql = format!(
            r#"
                UPDATE tasks SET ai_suggestion = :suggestion
                WHERE id = :id AND user_id = :user_id AND NOT {HAS_SUGGESTION}
                  AND (
                    :quota IS NULL
                    OR (SELECT COUNT(*) FROM tasks WHERE user_id = :user_id AND {HAS_SUGGESTION}) < :quota
                  )
            "#
        );
        let affected = conn.execute(
            &sql,
            named_params! {
                ":id": id,
                ":user_id": user_id,
                ":suggestion": suggestion,
                ":quota": quota.map(|value| value as i64),
            },
        )?;
        if affected > 0 {
            return Ok(SuggestionWrite::Stored);
        }

        let outcome = match Self::find_by_id(conn, id)?.filter(|row| row.user_id == user_id) {
            None => SuggestionWrite::Missing,
            Some(row) => {
                if row.into_record()?.has_suggestion() {
                    SuggestionWrite::AlreadySuggested
                } else {
                    SuggestionWrite::QuotaReached
                }
            }
        };
        Ok(outcome)
    }

    pub fn delete(conn: &Connection, id: &str, user_id: &str) -> AppResult<()> {
        let affected = conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
        )?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<TaskRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| TaskRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    /// Owner's tasks in creation order; ties broken by rowid so the order is
    /// stable across calls.
    pub fn list_by_user(conn: &Connection, user_id: &str) -> AppResult<Vec<TaskRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map([user_id], |row| TaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_with_suggestion(conn: &Connection, user_id: &str) -> AppResult<usize> {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM tasks WHERE user_id = ?1 AND {HAS_SUGGESTION}"),
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| AppError::database(format!("stored timestamp is not RFC 3339: {err}")))
}
