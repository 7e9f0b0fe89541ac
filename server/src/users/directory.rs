use rusqlite::{ErrorCode, OptionalExtension};

use crate::db::models::User;
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

/// User records keyed by unique username.
#[derive(Clone)]
pub struct UserDirectory {
    db: DbPool,
}

impl UserDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Insert a new user. Fails with `DuplicateUser` if the name is taken.
    pub fn create(
        &self,
        username: &str,
        email: &str,
        hashed_password: &str,
    ) -> Result<User, AppError> {
        let conn = self.db.lock().map_err(AppError::lock)?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT username FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(AppError::DuplicateUser);
        }

        let user = User {
            username: username.to_string(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            created_at: now_timestamp(),
        };

        conn.execute(
            "INSERT INTO users (username, email, hashed_password, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user.username, user.email, user.hashed_password, user.created_at],
        )
        .map_err(|e| match e.sqlite_error_code() {
            // Lost a race with a concurrent registration
            Some(ErrorCode::ConstraintViolation) => AppError::DuplicateUser,
            _ => AppError::Database(e),
        })?;

        Ok(user)
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let conn = self.db.lock().map_err(AppError::lock)?;

        let user = conn
            .query_row(
                "SELECT username, email, hashed_password, created_at FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(User {
                        username: row.get(0)?,
                        email: row.get(1)?,
                        hashed_password: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }
}
