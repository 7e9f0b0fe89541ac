use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::models::{Document, DocumentContent};
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

/// Metadata columns shared by every listing query.
const DOCUMENT_COLUMNS: &str = "id, filename, size, upload_date";

/// Document records stored in SQLite, content kept inline as a BLOB.
#[derive(Clone)]
pub struct DocumentStore {
    db: DbPool,
}

impl DocumentStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Store a new document with a fresh id and an empty retriever set.
    pub fn store(&self, filename: &str, content: &[u8]) -> Result<String, AppError> {
        let id = Uuid::now_v7().to_string();
        let now = now_timestamp();

        let conn = self.db.lock().map_err(AppError::lock)?;
        conn.execute(
            "INSERT INTO documents (id, filename, content, size, upload_date) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, filename, content, content.len() as i64, now],
        )?;

        tracing::debug!("Stored document {} ({}, {} bytes)", id, filename, content.len());
        Ok(id)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Document, AppError> {
        let conn = self.db.lock().map_err(AppError::lock)?;

        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                [id],
                row_to_document,
            )
            .optional()?
            .ok_or(AppError::DocumentNotFound)?;

        with_retrievers(&conn, doc)
    }

    /// Raw bytes of a document, for download.
    pub fn get_content(&self, id: &str) -> Result<DocumentContent, AppError> {
        let conn = self.db.lock().map_err(AppError::lock)?;

        conn.query_row(
            "SELECT filename, content FROM documents WHERE id = ?1",
            [id],
            |row| {
                Ok(DocumentContent {
                    filename: row.get(0)?,
                    content: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or(AppError::DocumentNotFound)
    }

    /// Every document, newest upload first. Read-only.
    pub fn list_all(&self) -> Result<Vec<Document>, AppError> {
        let conn = self.db.lock().map_err(AppError::lock)?;

        let docs = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM documents ORDER BY upload_date DESC, rowid DESC",
                DOCUMENT_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_document)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        docs.into_iter()
            .map(|doc| with_retrievers(&conn, doc))
            .collect()
    }

    /// Documents `username` has not yet retrieved, oldest upload first.
    ///
    /// Each returned document gets `username` added to its retriever set.
    /// The select and every insert share one transaction, so a failed call
    /// marks nothing. `retrieved_by` in the result is the set as it was
    /// before this call.
    pub fn list_pending_for(&self, username: &str) -> Result<Vec<Document>, AppError> {
        let mut conn = self.db.lock().map_err(AppError::lock)?;
        let tx = conn.transaction()?;

        let pending = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM documents d
                 WHERE NOT EXISTS (
                     SELECT 1 FROM document_retrievals r
                     WHERE r.document_id = d.id AND r.username = ?1
                 )
                 ORDER BY upload_date ASC, rowid ASC",
                DOCUMENT_COLUMNS
            ))?;
            let rows = stmt.query_map([username], row_to_document)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut result = Vec::with_capacity(pending.len());
        let now = now_timestamp();
        for doc in pending {
            let doc = with_retrievers(&tx, doc)?;
            tx.execute(
                "INSERT OR IGNORE INTO document_retrievals (document_id, username, retrieved_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![doc.id, username, now],
            )?;
            result.push(doc);
        }

        tx.commit()?;

        if !result.is_empty() {
            tracing::info!("Marked {} document(s) retrieved by {}", result.len(), username);
        }
        Ok(result)
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        filename: row.get(1)?,
        size: row.get(2)?,
        upload_date: row.get(3)?,
        retrieved_by: Vec::new(),
    })
}

/// Attach the retriever set, in first-retrieval order.
fn with_retrievers(conn: &Connection, mut doc: Document) -> Result<Document, AppError> {
    let mut stmt = conn.prepare_cached(
        "SELECT username FROM document_retrievals WHERE document_id = ?1 ORDER BY rowid ASC",
    )?;
    doc.retrieved_by = stmt
        .query_map([&doc.id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (DocumentStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let db = crate::db::init_db(tmp.path().to_str().unwrap()).unwrap();
        (DocumentStore::new(db), tmp)
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_store_and_get() {
        let (docs, _tmp) = store();
        let id = docs.store("report.pdf", b"%PDF-1.4 body").unwrap();

        let doc = docs.get_by_id(&id).unwrap();
        assert_eq!(doc.filename, "report.pdf");
        assert_eq!(doc.size, 13);
        assert!(doc.retrieved_by.is_empty());

        let content = docs.get_content(&id).unwrap();
        assert_eq!(content.content, b"%PDF-1.4 body");
    }

    #[test]
    fn test_unknown_id_not_found() {
        let (docs, _tmp) = store();
        assert!(matches!(docs.get_by_id("missing"), Err(AppError::DocumentNotFound)));
        assert!(matches!(docs.get_content("missing"), Err(AppError::DocumentNotFound)));
    }

    #[test]
    fn test_ids_are_unique() {
        let (docs, _tmp) = store();
        let a = docs.store("a.pdf", b"a").unwrap();
        let b = docs.store("a.pdf", b"a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_list_orders() {
        let (docs, _tmp) = store();
        let first = docs.store("1.pdf", b"1").unwrap();
        let second = docs.store("2.pdf", b"2").unwrap();
        let third = docs.store("3.pdf", b"3").unwrap();

        let all = docs.list_all().unwrap();
        assert_eq!(ids(&all), vec![third.as_str(), second.as_str(), first.as_str()]);

        let pending = docs.list_pending_for("bob").unwrap();
        assert_eq!(ids(&pending), vec![first.as_str(), second.as_str(), third.as_str()]);
    }

    #[test]
    fn test_pending_returns_each_document_once() {
        let (docs, _tmp) = store();
        let id = docs.store("d.pdf", b"d").unwrap();

        let first = docs.list_pending_for("bob").unwrap();
        assert_eq!(ids(&first), vec![id.as_str()]);
        // Snapshot from before marking
        assert!(first[0].retrieved_by.is_empty());

        assert!(docs.list_pending_for("bob").unwrap().is_empty());
        assert_eq!(docs.get_by_id(&id).unwrap().retrieved_by, vec!["bob".to_string()]);
    }

    #[test]
    fn test_pending_is_per_user() {
        let (docs, _tmp) = store();
        let id = docs.store("d.pdf", b"d").unwrap();

        docs.list_pending_for("bob").unwrap();
        let carol = docs.list_pending_for("carol").unwrap();
        assert_eq!(ids(&carol), vec![id.as_str()]);
        assert_eq!(carol[0].retrieved_by, vec!["bob".to_string()]);

        assert_eq!(
            docs.get_by_id(&id).unwrap().retrieved_by,
            vec!["bob".to_string(), "carol".to_string()]
        );
    }

    #[test]
    fn test_new_uploads_become_pending() {
        let (docs, _tmp) = store();
        docs.store("old.pdf", b"o").unwrap();
        docs.list_pending_for("bob").unwrap();

        let fresh = docs.store("new.pdf", b"n").unwrap();
        let pending = docs.list_pending_for("bob").unwrap();
        assert_eq!(ids(&pending), vec![fresh.as_str()]);
    }

    #[test]
    fn test_reads_do_not_mark() {
        let (docs, _tmp) = store();
        let a = docs.store("a.pdf", b"a").unwrap();
        let b = docs.store("b.pdf", b"b").unwrap();

        docs.list_all().unwrap();
        docs.get_by_id(&a).unwrap();
        docs.get_content(&b).unwrap();

        let pending = docs.list_pending_for("fresh").unwrap();
        assert_eq!(ids(&pending), vec![a.as_str(), b.as_str()]);
    }

    #[test]
    fn test_failed_pending_call_marks_nothing() {
        let (docs, _tmp) = store();
        let first = docs.store("1.pdf", b"1").unwrap();
        let second = docs.store("2.pdf", b"2").unwrap();

        // Abort the insert for the second document, after the first succeeded
        docs.db
            .lock()
            .unwrap()
            .execute_batch(&format!(
                "CREATE TRIGGER reject_second BEFORE INSERT ON document_retrievals
                 WHEN NEW.document_id = '{}'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                second
            ))
            .unwrap();

        assert!(docs.list_pending_for("bob").is_err());

        let rows: i64 = docs
            .db
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM document_retrievals", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);

        docs.db
            .lock()
            .unwrap()
            .execute_batch("DROP TRIGGER reject_second;")
            .unwrap();
        let pending = docs.list_pending_for("bob").unwrap();
        assert_eq!(ids(&pending), vec![first.as_str(), second.as_str()]);
    }

    #[test]
    fn test_empty_store() {
        let (docs, _tmp) = store();
        assert!(docs.list_all().unwrap().is_empty());
        assert!(docs.list_pending_for("bob").unwrap().is_empty());
    }
}
