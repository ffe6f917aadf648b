use rusqlite::{named_params, Connection, OptionalExtension};

use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct TokenRow {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
}

pub struct TokenRepository;

impl TokenRepository {
    pub fn insert(conn: &Connection, row: &TokenRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO auth_tokens (token_hash, user_id, created_at, expires_at)
                VALUES (:token_hash, :user_id, :created_at, :expires_at)
            "#,
            named_params! {
                ":token_hash": &row.token_hash,
                ":user_id": &row.user_id,
                ":created_at": &row.created_at,
                ":expires_at": &row.expires_at,
            },
        )?;
        Ok(())
    }

    pub fn find(conn: &Connection, token_hash: &str) -> AppResult<Option<TokenRow>> {
        let row = conn
            .query_row(
                "SELECT token_hash, user_id, created_at, expires_at FROM auth_tokens WHERE token_hash = ?1",
                [token_hash],
                |row| {
                    Ok(TokenRow {
                        token_hash: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn delete(conn: &Connection, token_hash: &str) -> AppResult<bool> {
        let affected = conn.execute("DELETE FROM auth_tokens WHERE token_hash = ?1", [token_hash])?;
        Ok(affected > 0)
    }

    /// `now` must be RFC 3339 UTC so the text comparison matches time order.
    pub fn purge_expired(conn: &Connection, now: &str) -> AppResult<usize> {
        let affected = conn.execute("DELETE FROM auth_tokens WHERE expires_at <= ?1", [now])?;
        Ok(affected)
    }
}
