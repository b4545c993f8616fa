//! Note database operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

use super::super::sqlite::{format_timestamp, parse_timestamp};
use super::super::Database;
use crate::models::note::{Note, DEFAULT_USER_ID};

const NOTE_COLUMNS: &str = "id, user_id, filename, title, content, created_at, updated_at";

impl Database {
    /// Insert a note row and return it
    pub fn create_note(&self, filename: &str, title: Option<&str>, content: &str) -> SqliteResult<Note> {
        let conn = self.conn.lock();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO notes (user_id, filename, title, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![DEFAULT_USER_ID, filename, title, content, format_timestamp(&now)],
        )?;

        Ok(Note {
            id: conn.last_insert_rowid(),
            user_id: DEFAULT_USER_ID,
            filename: filename.to_string(),
            title: title.map(|s| s.to_string()),
            content: content.to_string(),
            created_at: now,
            updated_at: None,
        })
    }

    pub fn get_note(&self, id: i64) -> SqliteResult<Option<Note>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS),
            [id],
            Self::row_to_note,
        )
        .optional()
    }

    /// All notes, newest first
    pub fn list_notes(&self) -> SqliteResult<Vec<Note>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes ORDER BY created_at DESC, id DESC",
            NOTE_COLUMNS
        ))?;
        let notes = stmt
            .query_map([], Self::row_to_note)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(notes)
    }

    /// Returns true if a row was removed
    pub fn delete_note(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn.lock();
        let affected = conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Case-insensitive substring match over title and filename, and over
    /// content when `include_content` is set. Newest first.
    ///
    /// Matching happens here rather than in SQL: SQLite's `lower()` only
    /// folds ASCII letters.
    pub fn search_notes(&self, term: &str, include_content: bool) -> SqliteResult<Vec<Note>> {
        let needle = term.to_lowercase();
        let matches = |field: &str| field.to_lowercase().contains(&needle);

        let notes = self
            .list_notes()?
            .into_iter()
            .filter(|note| {
                note.title.as_deref().is_some_and(matches)
                    || matches(&note.filename)
                    || (include_content && matches(&note.content))
            })
            .collect();
        Ok(notes)
    }

    /// Replace the stored content and stamp `updated_at`
    pub fn update_note_content(&self, id: i64, content: &str) -> SqliteResult<Option<Note>> {
        {
            let conn = self.conn.lock();
            let now = format_timestamp(&Utc::now());
            let affected = conn.execute(
                "UPDATE notes SET content = ?1, updated_at = ?2 WHERE id = ?3",
                params![content, now, id],
            )?;
            if affected == 0 {
                return Ok(None);
            }
        }
        self.get_note(id)
    }

    fn row_to_note(row: &Row) -> SqliteResult<Note> {
        let created_at: String = row.get(5)?;
        let updated_at: Option<String> = row.get(6)?;

        Ok(Note {
            id: row.get(0)?,
            user_id: row.get(1)?,
            filename: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            created_at: parse_timestamp(&created_at),
            updated_at: updated_at.as_deref().map(parse_timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_crud() {
        let db = Database::in_memory().unwrap();
        let note = db.create_note("groceries.txt", Some("Groceries"), "milk, eggs").unwrap();
        assert_eq!(note.user_id, 1);

        let fetched = db.get_note(note.id).unwrap().unwrap();
        assert_eq!(fetched.display_title(), "Groceries");
        assert!(fetched.updated_at.is_none());

        let updated = db.update_note_content(note.id, "milk, eggs, bread").unwrap().unwrap();
        assert_eq!(updated.content, "milk, eggs, bread");
        assert!(updated.updated_at.is_some());

        assert!(db.delete_note(note.id).unwrap());
        assert!(!db.delete_note(note.id).unwrap());
        assert!(db.get_note(note.id).unwrap().is_none());
    }

    #[test]
    fn test_search_is_case_insensitive_and_scoped() {
        let db = Database::in_memory().unwrap();
        db.create_note("ideas.txt", Some("Project Ideas"), "build a robot").unwrap();
        db.create_note("todo.txt", Some("Todo"), "call the ROBOT shop").unwrap();

        assert_eq!(db.search_notes("IDEAS", false).unwrap().len(), 1);
        assert_eq!(db.search_notes("robot", false).unwrap().len(), 0);

        let with_content = db.search_notes("robot", true).unwrap();
        assert_eq!(with_content.len(), 2);
        // Newest first
        assert_eq!(with_content[0].filename, "todo.txt");
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let db = Database::in_memory().unwrap();
        db.create_note("a.txt", Some("100% done"), "x").unwrap();
        db.create_note("b.txt", Some("100 done"), "y").unwrap();

        let found = db.search_notes("100%", false).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "a.txt");
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let db = Database::in_memory().unwrap();
        db.create_note("aerzte.txt", Some("Ärzte"), "Termin beim ÖLWECHSEL").unwrap();
        db.create_note("cafe.txt", Some("CAFÉ list"), "x").unwrap();

        let found = db.search_notes("ärzte", false).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "aerzte.txt");

        assert_eq!(db.search_notes("café", false).unwrap().len(), 1);
        assert_eq!(db.search_notes("ölwechsel", true).unwrap().len(), 1);
        assert!(db.search_notes("ölwechsel", false).unwrap().is_empty());
    }
}
