use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking, no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Initial schema

CREATE TABLE users (
    username TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    hashed_password TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE documents (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    content BLOB NOT NULL,
    size INTEGER NOT NULL,
    upload_date TEXT NOT NULL
);

CREATE INDEX idx_documents_upload_date ON documents(upload_date);

-- Retriever set: one row per (document, username), set semantics via the key
CREATE TABLE document_retrievals (
    document_id TEXT NOT NULL,
    username TEXT NOT NULL,
    retrieved_at TEXT NOT NULL,
    PRIMARY KEY (document_id, username),
    FOREIGN KEY (document_id) REFERENCES documents(id)
);

CREATE INDEX idx_document_retrievals_username ON document_retrievals(username);
",
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_validate() {
        assert!(migrations().validate().is_ok());
    }
}
