//! Note tools: list, save, retrieve and edit user notes
//!
//! Saving and editing go through `NoteStore` so the notes table, the note
//! file and the session breadcrumb stay consistent.

use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolGroup, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::models::Note;
use crate::notes::{EditMode, EditOutcome};

const LIST_PREVIEW_CHARS: usize = 60;
const RETRIEVE_PREVIEW_CHARS: usize = 100;
const MAX_LISTED_MATCHES: usize = 5;

fn preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        format!("{}...", content.chars().take(max_chars).collect::<String>())
    } else {
        content.to_string()
    }
}

fn local_time(note: &Note, format: &str) -> String {
    note.created_at.with_timezone(&Local).format(format).to_string()
}

fn definition(
    name: &str,
    description: &str,
    properties: HashMap<String, PropertySchema>,
    required: &[&str],
) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required: required.iter().map(|s| s.to_string()).collect(),
        },
        group: ToolGroup::Notes,
    }
}

// ---------------------------------------------------------------------------
// list_notes
// ---------------------------------------------------------------------------

pub struct ListNotesTool {
    definition: ToolDefinition,
}

impl ListNotesTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "query".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "Optional query to filter notes, or 'list' to show all".to_string(),
                default: Some(json!("list")),
                items: None,
                enum_values: None,
            },
        );

        ListNotesTool {
            definition: definition(
                "list_notes",
                "List all available notes in the database with their titles, IDs, and creation dates. \
                 Use this when: \
                 (1) User asks 'what notes do I have?', 'show my notes', 'list all notes', \
                 (2) User wants to edit a note but you need to see what notes exist first, \
                 (3) Before editing/appending to a note to verify which note to modify. \
                 This helps identify the correct note before retrieving or editing it.",
                properties,
                &[],
            ),
        }
    }
}

impl Default for ListNotesTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ListNotesTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, _params: Value, context: &ToolContext) -> ToolResult {
        let db = match &context.database {
            Some(db) => db,
            None => return ToolResult::error("Error listing notes: database not available"),
        };

        let notes = match db.list_notes() {
            Ok(notes) => notes,
            Err(e) => return ToolResult::error(format!("Error listing notes: {}", e)),
        };

        if notes.is_empty() {
            return ToolResult::success(
                "No notes found in the database. You can create a new note by asking me to save one.",
            );
        }

        let mut lines = vec![format!("Available Notes ({} total):\n", notes.len())];
        for (i, note) in notes.iter().enumerate() {
            lines.push(format!(
                "{}. Title: {}\n   ID: {} | Filename: {}\n   Created: {}\n   Preview: {}\n",
                i + 1,
                note.display_title(),
                note.id,
                note.filename,
                local_time(note, "%Y-%m-%d %H:%M"),
                preview(&note.content, LIST_PREVIEW_CHARS)
            ));
        }
        lines.push("\nTo view full content of any note, ask me to retrieve it by title or ID.".to_string());

        log::info!("[NOTES] Listed {} notes", notes.len());
        ToolResult::success(lines.join("\n")).with_metadata(json!({ "count": notes.len() }))
    }
}

// ---------------------------------------------------------------------------
// save_note
// ---------------------------------------------------------------------------

pub struct SaveNoteTool {
    definition: ToolDefinition,
}

impl SaveNoteTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert("title".to_string(), PropertySchema::string("Title or filename for the note"));
        properties.insert("content".to_string(), PropertySchema::string("The content of the note to save"));

        SaveNoteTool {
            definition: definition(
                "save_note",
                "Save a note to the database with a title and content. \
                 ONLY use when the user EXPLICITLY asks to 'save a note', 'remember this', \
                 'take a note', or 'write this down'. NOT for searching or retrieving notes. \
                 Input should include a title (filename) and the content to save.",
                properties,
                &["title", "content"],
            ),
        }
    }
}

impl Default for SaveNoteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SaveNoteParams {
    title: String,
    content: String,
}

#[async_trait]
impl Tool for SaveNoteTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params: SaveNoteParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let store = match &context.notes {
            Some(store) => store,
            None => return ToolResult::error("Failed to save note: note storage not available"),
        };

        match store.save(&params.title, &params.content, context.session_id.as_deref()) {
            Ok(note) => ToolResult::success(format!(
                "Note saved successfully!\n\
                 Title: {}\n\
                 Filename: {}\n\
                 Location: data/user_notes/{}\n\
                 Note ID: {}\n\
                 You can retrieve this note anytime by asking for '{}'.",
                params.title, note.filename, note.filename, note.id, params.title
            ))
            .with_metadata(json!({ "note_id": note.id, "filename": note.filename })),
            Err(e) => {
                log::error!("[NOTES] Error saving note: {}", e);
                ToolResult::error(format!("Failed to save note: {}", e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// retrieve_note
// ---------------------------------------------------------------------------

pub struct RetrieveNoteTool {
    definition: ToolDefinition,
}

impl RetrieveNoteTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "search_term".to_string(),
            PropertySchema::string("Title, filename, or keyword to search for in notes"),
        );

        RetrieveNoteTool {
            definition: definition(
                "retrieve_note",
                "Retrieve a previously saved note by searching for its title, filename, or keywords in the content. \
                 ONLY use when the user asks to 'see', 'read', 'find', or 'retrieve' a SPECIFIC NOTE. \
                 NOT for general web searches or document searches. \
                 Use this when the user asks to see, read, or find a note.",
                properties,
                &["search_term"],
            ),
        }
    }
}

impl Default for RetrieveNoteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct RetrieveNoteParams {
    search_term: String,
}

#[async_trait]
impl Tool for RetrieveNoteTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params: RetrieveNoteParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };
        let term = params.search_term;
        log::info!("[NOTES] Searching for notes: {}", term);

        let store = match &context.notes {
            Some(store) => store,
            None => return ToolResult::error("Error retrieving notes: note storage not available"),
        };

        let notes = match store.find(&term) {
            Ok(notes) => notes,
            Err(e) => return ToolResult::error(format!("Error retrieving notes: {}", e)),
        };

        match notes.as_slice() {
            [] => ToolResult::success(format!(
                "No notes found matching '{}'. Try a different search term or ask me to list all notes.",
                term
            )),
            [note] => ToolResult::success(format!(
                "📝 Note Found:\n\nTitle: {}\nFilename: {}\nCreated: {}\n\nContent:\n{}",
                note.display_title(),
                note.filename,
                local_time(note, "%Y-%m-%d %H:%M:%S"),
                note.content
            ))
            .with_metadata(json!({ "note_id": note.id })),
            _ => {
                let mut lines = vec![format!("Found {} notes matching '{}':\n", notes.len(), term)];
                for (i, note) in notes.iter().take(MAX_LISTED_MATCHES).enumerate() {
                    lines.push(format!(
                        "{}. {}\n   ID: {} | Created: {}\n   Preview: {}\n",
                        i + 1,
                        note.display_title(),
                        note.id,
                        local_time(note, "%Y-%m-%d %H:%M:%S"),
                        preview(&note.content, RETRIEVE_PREVIEW_CHARS)
                    ));
                }
                if notes.len() > MAX_LISTED_MATCHES {
                    lines.push(format!(
                        "\n... and {} more. Try a more specific search.",
                        notes.len() - MAX_LISTED_MATCHES
                    ));
                }
                ToolResult::success(lines.join("\n")).with_metadata(json!({ "count": notes.len() }))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// edit_note
// ---------------------------------------------------------------------------

pub struct EditNoteTool {
    definition: ToolDefinition,
}

impl EditNoteTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "search_term".to_string(),
            PropertySchema::string("Title or filename of the note to edit"),
        );
        properties.insert(
            "new_content".to_string(),
            PropertySchema::string("New content to replace the old content, or content to append"),
        );
        properties.insert(
            "mode".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "Edit mode: 'replace' to replace entire content, 'append' to add to end".to_string(),
                default: Some(json!("replace")),
                items: None,
                enum_values: Some(vec!["replace".to_string(), "append".to_string()]),
            },
        );

        EditNoteTool {
            definition: definition(
                "edit_note",
                "Edit or update an existing note by searching for its title or filename. \
                 Use this when the user asks to 'edit', 'update', 'modify', 'append to', or 'add to' an existing note \
                 AND the user has provided the NEW content they want to add or replace. \
                 If user hasn't provided the new content yet, use 'retrieve_note' first to show them the current content, \
                 then ask what they want to add/change. \
                 Can either replace the entire content or append new content to existing content. \
                 NOT for creating new notes (use save_note for that).",
                properties,
                &["search_term", "new_content"],
            ),
        }
    }
}

impl Default for EditNoteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct EditNoteParams {
    search_term: String,
    new_content: String,
    #[serde(default)]
    mode: Option<String>,
}

#[async_trait]
impl Tool for EditNoteTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params: EditNoteParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let store = match &context.notes {
            Some(store) => store,
            None => return ToolResult::error("Error editing note: note storage not available"),
        };

        let mode = params.mode.as_deref().map(EditMode::parse).unwrap_or_default();
        let outcome = store.edit(
            &params.search_term,
            &params.new_content,
            mode,
            context.session_id.as_deref(),
        );

        match outcome {
            Ok(EditOutcome::NotFound) => ToolResult::error(format!(
                "No note found matching '{}'. Please check the title and try again.",
                params.search_term
            )),
            Ok(EditOutcome::Ambiguous(notes)) => {
                let mut lines = vec![format!(
                    "Found {} notes matching '{}'. Please be more specific:\n",
                    notes.len(),
                    params.search_term
                )];
                for (i, note) in notes.iter().take(MAX_LISTED_MATCHES).enumerate() {
                    lines.push(format!("{}. {} (ID: {})", i + 1, note.display_title(), note.id));
                }
                ToolResult::success(lines.join("\n"))
            }
            Ok(EditOutcome::Edited { note, mode }) => ToolResult::success(format!(
                "Note '{}' updated successfully!\n\
                 Filename: {}\n\
                 Location: data/user_notes/{}\n\
                 Action: Content {}\n\
                 Note ID: {}",
                note.display_title(),
                note.filename,
                note.filename,
                mode.action(),
                note.id
            ))
            .with_metadata(json!({ "note_id": note.id })),
            Err(e) => {
                log::error!("[NOTES] Error editing note: {}", e);
                ToolResult::error(format!("Error editing note: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::notes::NoteStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn context(session: Option<&str>) -> (ToolContext, Arc<Database>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());
        let store = Arc::new(NoteStore::new(db.clone(), dir.path().to_path_buf()));
        let mut ctx = ToolContext::new().with_database(db.clone()).with_notes(store);
        if let Some(s) = session {
            ctx = ctx.with_session(s);
        }
        (ctx, db, dir)
    }

    #[test]
    fn test_note_tool_definitions() {
        assert_eq!(SaveNoteTool::new().definition().input_schema.required, vec!["title", "content"]);
        assert_eq!(RetrieveNoteTool::new().definition().name, "retrieve_note");
        assert_eq!(ListNotesTool::new().definition().group, ToolGroup::Notes);
        let edit = EditNoteTool::new().definition();
        assert_eq!(
            edit.input_schema.properties["mode"].enum_values,
            Some(vec!["replace".to_string(), "append".to_string()])
        );
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short", 60), "short");
        let long = "é".repeat(70);
        assert_eq!(preview(&long, 60), format!("{}...", "é".repeat(60)));
    }

    #[tokio::test]
    async fn test_save_then_list_and_retrieve() {
        let (ctx, db, dir) = context(Some("s1"));

        let saved = SaveNoteTool::new()
            .execute(json!({"title": "Groceries", "content": "milk, eggs and a very long list of other items to buy"}), &ctx)
            .await;
        assert!(saved.success);
        assert!(saved.content.starts_with("Note saved successfully!\nTitle: Groceries\nFilename: Groceries.txt"));
        assert!(dir.path().join("Groceries.txt").exists());
        assert_eq!(db.load_agent_history("s1").unwrap().len(), 1);

        let listed = ListNotesTool::new().execute(json!({}), &ctx).await;
        assert!(listed.content.starts_with("Available Notes (1 total):"));
        assert!(listed.content.contains("Preview: milk, eggs and a very long list of other items to buy"));

        let found = RetrieveNoteTool::new().execute(json!({"search_term": "eggs"}), &ctx).await;
        assert!(found.content.starts_with("📝 Note Found:\n\nTitle: Groceries"));

        let missing = RetrieveNoteTool::new().execute(json!({"search_term": "piano"}), &ctx).await;
        assert_eq!(
            missing.content,
            "No notes found matching 'piano'. Try a different search term or ask me to list all notes."
        );
    }

    #[tokio::test]
    async fn test_retrieve_many_lists_five_and_remainder() {
        let (ctx, _db, _dir) = context(None);
        for i in 0..7 {
            SaveNoteTool::new()
                .execute(json!({"title": format!("Meeting {}", i), "content": "agenda"}), &ctx)
                .await;
        }

        let result = RetrieveNoteTool::new().execute(json!({"search_term": "meeting"}), &ctx).await;
        assert!(result.content.starts_with("Found 7 notes matching 'meeting':"));
        assert!(result.content.contains("5. Meeting"));
        assert!(!result.content.contains("6. Meeting"));
        assert!(result.content.ends_with("... and 2 more. Try a more specific search."));
    }

    #[tokio::test]
    async fn test_edit_note_flows() {
        let (ctx, db, _dir) = context(Some("s9"));
        SaveNoteTool::new()
            .execute(json!({"title": "Packing", "content": "socks"}), &ctx)
            .await;

        let appended = EditNoteTool::new()
            .execute(json!({"search_term": "packing", "new_content": "charger", "mode": "append"}), &ctx)
            .await;
        assert!(appended.success);
        assert!(appended.content.contains("Action: Content appended to"));
        let note = db.list_notes().unwrap().remove(0);
        assert_eq!(note.content, "socks\n\ncharger");

        let history = db.load_agent_history("s9").unwrap();
        assert_eq!(history.last().unwrap().message, "[SYSTEM] Note edited: 'Packing' (content appended to).");

        let missing = EditNoteTool::new()
            .execute(json!({"search_term": "nothing", "new_content": "x"}), &ctx)
            .await;
        assert!(!missing.success);
        assert_eq!(missing.content, "No note found matching 'nothing'. Please check the title and try again.");
    }
}
