//! Database row types.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use serde::Serialize;

/// User record in the users table
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub created_at: String,
}

/// Public view of a user; the password hash is never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Document metadata joined with its retriever set.
/// Content bytes live in the same row but are loaded separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub size: i64,
    pub upload_date: String,
    pub retrieved_by: Vec<String>,
}

/// Raw document payload for download
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub filename: String,
    pub content: Vec<u8>,
}
