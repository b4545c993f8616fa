//! Uploaded document tracking

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

use super::super::sqlite::{format_timestamp, parse_timestamp};
use super::super::Database;
use crate::models::document::{Document, DocumentStatus};
use crate::models::note::DEFAULT_USER_ID;

impl Database {
    pub fn create_document(
        &self,
        filename: &str,
        file_path: &str,
        file_type: &str,
        status: DocumentStatus,
    ) -> SqliteResult<Document> {
        let conn = self.conn.lock();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO documents (user_id, filename, file_path, file_type, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![DEFAULT_USER_ID, filename, file_path, file_type, status.as_str(), format_timestamp(&now)],
        )?;

        Ok(Document {
            id: conn.last_insert_rowid(),
            user_id: DEFAULT_USER_ID,
            filename: filename.to_string(),
            file_path: file_path.to_string(),
            file_type: file_type.to_string(),
            status,
            created_at: now,
        })
    }

    pub fn set_document_status(&self, id: i64, status: DocumentStatus) -> SqliteResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: i64) -> SqliteResult<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, filename, file_path, file_type, status, created_at
             FROM documents WHERE id = ?1",
            [id],
            Self::row_to_document,
        )
        .optional()
    }

    /// Newest first
    pub fn list_documents(&self) -> SqliteResult<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, filename, file_path, file_type, status, created_at
             FROM documents ORDER BY created_at DESC, id DESC",
        )?;
        let docs = stmt
            .query_map([], Self::row_to_document)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(docs)
    }

    fn row_to_document(row: &Row) -> SqliteResult<Document> {
        let status: String = row.get(5)?;
        let created_at: String = row.get(6)?;

        Ok(Document {
            id: row.get(0)?,
            user_id: row.get(1)?,
            filename: row.get(2)?,
            file_path: row.get(3)?,
            file_type: row.get(4)?,
            status: DocumentStatus::from_str(&status).unwrap_or_default(),
            created_at: parse_timestamp(&created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_status_transitions() {
        let db = Database::in_memory().unwrap();
        let doc = db
            .create_document("paper.pdf", "/tmp/paper.pdf", "pdf", DocumentStatus::Processing)
            .unwrap();

        db.set_document_status(doc.id, DocumentStatus::Processed).unwrap();
        let stored = db.get_document(doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Processed);
        assert_eq!(stored.file_type, "pdf");

        db.create_document("notes.txt", "/tmp/notes.txt", "txt", DocumentStatus::Failed).unwrap();
        let all = db.list_documents().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].filename, "notes.txt");
    }
}
