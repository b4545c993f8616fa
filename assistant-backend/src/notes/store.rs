//! NoteStore: keeps the notes table, the note files and the session
//! breadcrumbs in step.

use std::path::PathBuf;
use std::sync::Arc;

use super::file_ops::{self, NoteHeader};
use crate::db::Database;
use crate::models::{Note, Role};

/// How `edit` applies new content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Replace,
    Append,
}

impl EditMode {
    /// Anything other than "append" replaces
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("append") {
            EditMode::Append
        } else {
            EditMode::Replace
        }
    }

    /// Past-tense verb used in confirmations and breadcrumbs
    pub fn action(&self) -> &'static str {
        match self {
            EditMode::Replace => "replaced",
            EditMode::Append => "appended to",
        }
    }
}

#[derive(Debug)]
pub enum EditOutcome {
    NotFound,
    /// More than one note matched; newest first
    Ambiguous(Vec<Note>),
    Edited { note: Note, mode: EditMode },
}

pub struct NoteStore {
    db: Arc<Database>,
    notes_dir: PathBuf,
}

impl NoteStore {
    pub fn new(db: Arc<Database>, notes_dir: PathBuf) -> Self {
        Self { db, notes_dir }
    }

    /// Write the note file, insert the row and, inside a session, leave a
    /// breadcrumb so later turns know the note exists
    pub fn save(&self, title: &str, content: &str, session_id: Option<&str>) -> Result<Note, String> {
        log::info!("[NOTES] Saving note: {} (session: {})", title, session_id.unwrap_or("none"));

        let filename = file_ops::sanitize_filename(title);
        let path = self.notes_dir.join(&filename);
        let text = file_ops::render_note_file(
            &NoteHeader {
                title,
                created_at: chrono::Utc::now(),
                updated_at: None,
                session_id,
            },
            content,
        );
        file_ops::write_note(&path, &text)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        let note = self
            .db
            .create_note(&filename, Some(title), content)
            .map_err(|e| format!("Failed to store note: {}", e))?;

        if let Some(session) = session_id {
            self.db
                .add_conversation_message(
                    session,
                    Role::System,
                    &format!(
                        "[SYSTEM] Note saved: '{}' (File: {}). User can retrieve this note anytime.",
                        title, filename
                    ),
                )
                .map_err(|e| format!("Failed to record note breadcrumb: {}", e))?;
        }

        log::info!("[NOTES] Saved note {} (ID: {})", filename, note.id);
        Ok(note)
    }

    /// Notes whose title, filename or content contain `term`
    pub fn find(&self, term: &str) -> Result<Vec<Note>, String> {
        self.db
            .search_notes(term, true)
            .map_err(|e| format!("Failed to search notes: {}", e))
    }

    /// Edit the single note whose title or filename matches `search_term`
    pub fn edit(
        &self,
        search_term: &str,
        new_content: &str,
        mode: EditMode,
        session_id: Option<&str>,
    ) -> Result<EditOutcome, String> {
        log::info!("[NOTES] Editing note: {} (mode: {:?})", search_term, mode);

        let mut matches = self
            .db
            .search_notes(search_term, false)
            .map_err(|e| format!("Failed to search notes: {}", e))?;

        let target = match matches.len() {
            0 => return Ok(EditOutcome::NotFound),
            1 => matches.remove(0),
            _ => return Ok(EditOutcome::Ambiguous(matches)),
        };

        let content = match mode {
            EditMode::Append => format!("{}\n\n{}", target.content, new_content),
            EditMode::Replace => new_content.to_string(),
        };

        let note = self
            .db
            .update_note_content(target.id, &content)
            .map_err(|e| format!("Failed to update note: {}", e))?
            .ok_or_else(|| format!("Note {} disappeared during edit", target.id))?;

        let path = self.notes_dir.join(&note.filename);
        let text = file_ops::render_note_file(
            &NoteHeader {
                title: note.display_title(),
                created_at: note.created_at,
                updated_at: note.updated_at,
                session_id,
            },
            &note.content,
        );
        file_ops::write_note(&path, &text)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        if let Some(session) = session_id {
            self.db
                .add_conversation_message(
                    session,
                    Role::System,
                    &format!(
                        "[SYSTEM] Note edited: '{}' (content {}).",
                        note.display_title(),
                        mode.action()
                    ),
                )
                .map_err(|e| format!("Failed to record note breadcrumb: {}", e))?;
        }

        log::info!("[NOTES] Edited note {} (ID: {})", note.filename, note.id);
        Ok(EditOutcome::Edited { note, mode })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_note(dir: &tempfile::TempDir, filename: &str) -> String {
        std::fs::read_to_string(dir.path().join("user_notes").join(filename)).unwrap()
    }

    fn store() -> (NoteStore, Arc<Database>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());
        let store = NoteStore::new(db.clone(), dir.path().join("user_notes"));
        (store, db, dir)
    }

    #[test]
    fn test_save_writes_file_row_and_breadcrumb() {
        let (store, db, dir) = store();
        let note = store.save("Groceries", "milk", Some("s1")).unwrap();
        assert_eq!(note.filename, "Groceries.txt");

        let text = read_note(&dir, "Groceries.txt");
        assert!(text.starts_with("Title: Groceries\n"));
        assert!(text.contains("Session: s1"));
        assert!(text.ends_with("milk"));

        let history = db.load_agent_history("s1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].message,
            "[SYSTEM] Note saved: 'Groceries' (File: Groceries.txt). User can retrieve this note anytime."
        );
    }

    #[test]
    fn test_save_without_session_leaves_no_breadcrumb() {
        let (store, db, dir) = store();
        store.save("Quiet note", "shh", None).unwrap();
        assert!(db.get_conversation("default", 10).unwrap().is_empty());
        let text = read_note(&dir, "Quiet note.txt");
        assert!(!text.contains("Session:"));
    }

    #[test]
    fn test_edit_append_and_replace() {
        let (store, db, dir) = store();
        store.save("Todo", "buy milk", None).unwrap();

        match store.edit("todo", "call mom", EditMode::Append, Some("s1")).unwrap() {
            EditOutcome::Edited { note, mode } => {
                assert_eq!(note.content, "buy milk\n\ncall mom");
                assert_eq!(mode.action(), "appended to");
                assert!(note.updated_at.is_some());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let text = read_note(&dir, "Todo.txt");
        assert!(text.contains("Updated: "));
        assert!(text.ends_with("buy milk\n\ncall mom"));

        let history = db.load_agent_history("s1").unwrap();
        assert_eq!(history[0].message, "[SYSTEM] Note edited: 'Todo' (content appended to).");

        match store.edit("Todo", "fresh", EditMode::parse("REPLACE"), None).unwrap() {
            EditOutcome::Edited { note, .. } => assert_eq!(note.content, "fresh"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_edit_not_found_and_ambiguous() {
        let (store, _db, _dir) = store();
        store.save("Work ideas", "a", None).unwrap();
        store.save("Home ideas", "b", None).unwrap();

        assert!(matches!(
            store.edit("garden", "x", EditMode::Replace, None).unwrap(),
            EditOutcome::NotFound
        ));
        match store.edit("ideas", "x", EditMode::Replace, None).unwrap() {
            EditOutcome::Ambiguous(notes) => assert_eq!(notes.len(), 2),
            other => panic!("unexpected outcome: {:?}", other),
        }
        // Content is not searched when editing
        assert!(matches!(
            store.edit("b", "x", EditMode::Replace, None).unwrap(),
            EditOutcome::NotFound
        ));
    }

    #[test]
    fn test_edit_mode_parse() {
        assert_eq!(EditMode::parse("append"), EditMode::Append);
        assert_eq!(EditMode::parse(" Append "), EditMode::Append);
        assert_eq!(EditMode::parse("overwrite"), EditMode::Replace);
    }
}
