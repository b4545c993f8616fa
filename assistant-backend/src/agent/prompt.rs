//! System prompt assembly from session history

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{HistoryEntry, Role};

static UPLOADED_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Document uploaded: '([^']+)'").unwrap());

const INTRO: &str = "You are a helpful AI assistant with access to multiple tools. ";

const CONTEXT_RULES_WITH_DOCUMENTS: &str = "IMPORTANT CONTEXT RULES:\n\
1. ONLY answer the CURRENT user question - do NOT reference previous unrelated queries\n\
2. REMEMBER context about: uploaded documents, saved notes, file/directory operations, ongoing conversations\n\
3. When user says 'it', 'that file', 'the folder', 'that document' - refer to conversation history to identify what they mean\n\
4. If user asks about a file/folder mentioned earlier, remember which one they're referring to\n\
5. For UNRELATED new questions (time, weather, general facts), give fresh responses without referencing old queries\n\n";

const CONTEXT_RULES: &str = "IMPORTANT CONTEXT RULES:\n\
1. ONLY answer the CURRENT user question - do NOT reference previous unrelated queries\n\
2. REMEMBER context about: saved notes, file/directory operations, ongoing conversations\n\
3. When user says 'it', 'that file', 'the folder', 'that note' - refer to conversation history to identify what they mean\n\
4. If user asks about a file/folder/note mentioned earlier, remember which one they're referring to\n\
5. For UNRELATED new questions (time, weather, general facts), give fresh responses without referencing old queries\n\n";

const REFERENCE_TRACKING: &str = "CONTEXTUAL REFERENCE TRACKING:\n\
- ALWAYS maintain awareness of files, folders, documents, and notes mentioned in conversation history\n\
- When user uses pronouns (it, that, this, those) or vague references, LOOK BACK at the conversation\n\
- Track what was discussed: 'the document' = last mentioned document, 'that note' = last mentioned note\n\
- Examples:\n\
  * User: 'I uploaded a file about AI' → Later: 'What does it say?' → 'it' = the AI file\n\
  * User: 'I saved a note called Ideas' → Later: 'Add X to it' → 'it' = Ideas note\n\
  * User: 'Created folder /docs' → Later: 'List files in that folder' → 'that folder' = /docs\n\
- Check system messages in history for uploads, note creation, and file operations\n\
- If unclear what user is referring to, ask for clarification instead of guessing\n\n";

const QUERY_PRESERVATION: &str = "WEB SEARCH QUERY FORMULATION (CRITICAL):\n\
When using web_search tool, PRESERVE ALL user intent and details:\n\
- DO NOT simplify or paraphrase - maintain exact product names, versions, specifications\n\
- INCLUDE source requirements: 'official site', 'brand website', 'go to X' → search for 'X official site'\n\
- KEEP all qualifiers: 'current', 'latest', 'today', specific locations\n\
- NEVER change product names (conditioner ≠ shampoo, iPhone 15 ≠ iPhone 14)\n\
- Examples:\n\
  ✓ User: 'Go to Nike site for price' → Query: 'Nike official website price'\n\
  ✓ User: 'True Frog conditioner MRP from brand site' → Query: 'True Frog official brand site conditioner MRP'\n\
  ✗ User: 'conditioner' → Query: 'shampoo' (WRONG - never change products!)\n\
  ✗ User: 'brand site' → Query: drops this requirement (WRONG - keep source info!)\n\n";

const DOCUMENT_SEARCH: &str = "DOCUMENT SEARCH: Documents have been uploaded in this session. \
When user asks questions about topics that could be in uploaded documents, \
use 'rag_search' FIRST. Only use web search if rag_search returns no results.\n\n";

const NOTE_WORKFLOW: &str = "NOTE EDITING WORKFLOW: When user asks to edit/add to a note: \
(1) Use 'list_notes', (2) Identify note, (3) Use 'retrieve_note', \
(4) Ask what to add, (5) Wait for content, (6) Use 'edit_note'.";

fn system_messages(history: &[HistoryEntry]) -> impl Iterator<Item = &str> {
    history
        .iter()
        .filter(|entry| entry.role == Role::System)
        .map(|entry| entry.message.as_str())
}

/// True when an upload breadcrumb exists in the session
pub fn has_uploaded_documents(history: &[HistoryEntry]) -> bool {
    system_messages(history).any(|m| m.contains("Document uploaded"))
}

/// Document names from upload breadcrumbs, oldest first
pub fn uploaded_documents(history: &[HistoryEntry]) -> Vec<String> {
    system_messages(history)
        .filter_map(|m| UPLOADED_DOCUMENT.captures(m))
        .filter_map(|caps| caps.get(1).map(|name| name.as_str().to_string()))
        .collect()
}

/// The single system instruction for a turn
pub fn build_system_prompt(history: &[HistoryEntry]) -> String {
    let with_documents = has_uploaded_documents(history);

    let mut prompt = String::from(INTRO);
    prompt.push_str(if with_documents { CONTEXT_RULES_WITH_DOCUMENTS } else { CONTEXT_RULES });
    prompt.push_str(REFERENCE_TRACKING);
    prompt.push_str(QUERY_PRESERVATION);
    if with_documents {
        prompt.push_str(DOCUMENT_SEARCH);
    }
    prompt.push_str(NOTE_WORKFLOW);

    let context: Vec<&str> = system_messages(history).collect();
    if !context.is_empty() {
        prompt.push_str("\n\nCONTEXT FROM CONVERSATION:\n");
        prompt.push_str(&context.join("\n"));
    }

    let documents = uploaded_documents(history);
    if let Some(latest) = documents.last() {
        prompt.push_str(&format!(
            "\n\nDOCUMENTS UPLOADED IN THIS SESSION:\n\
             The following document(s) were uploaded in THIS conversation session: '{}'\n\
             When user says 'the document', 'the file', 'the paper', or 'it', they are referring to: '{}'\n\
             IMPORTANT: When searching with rag_search, focus on content from THIS document: '{}'\n\
             If search results come from other documents (not '{}'), mention this to the user and ask for clarification.\n",
            documents.join("', '"),
            latest,
            latest,
            latest
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_without_breadcrumbs() {
        let history = vec![HistoryEntry::new(Role::User, "hello")];
        let prompt = build_system_prompt(&history);
        assert!(prompt.starts_with("You are a helpful AI assistant with access to multiple tools. "));
        assert!(prompt.contains("NOTE EDITING WORKFLOW"));
        assert!(!prompt.contains("DOCUMENT SEARCH"));
        assert!(!prompt.contains("CONTEXT FROM CONVERSATION"));
        assert!(prompt.ends_with("(6) Use 'edit_note'."));
    }

    #[test]
    fn test_documents_variant_names_latest_upload() {
        let history = vec![
            HistoryEntry::new(
                Role::System,
                "[SYSTEM] Document uploaded: 'a.pdf' (3 chunks). User can now ask questions about this document.",
            ),
            HistoryEntry::new(Role::System, "[SYSTEM] Note saved: 'Ideas' (File: Ideas.txt)."),
            HistoryEntry::new(
                Role::System,
                "[SYSTEM] Document uploaded: 'b.txt' (1 chunks). User can now ask questions about this document.",
            ),
        ];

        assert_eq!(uploaded_documents(&history), vec!["a.pdf", "b.txt"]);

        let prompt = build_system_prompt(&history);
        assert!(prompt.contains("DOCUMENT SEARCH: Documents have been uploaded in this session."));
        assert!(prompt.contains("\n\nCONTEXT FROM CONVERSATION:\n[SYSTEM] Document uploaded: 'a.pdf'"));
        assert!(prompt.contains("[SYSTEM] Note saved: 'Ideas'"));
        assert!(prompt.contains("uploaded in THIS conversation session: 'a.pdf', 'b.txt'"));
        assert!(prompt.contains("they are referring to: 'b.txt'"));
    }

    #[test]
    fn test_note_breadcrumb_adds_context_only() {
        let history = vec![HistoryEntry::new(Role::System, "[SYSTEM] Note saved: 'Ideas'")];
        let prompt = build_system_prompt(&history);
        assert!(prompt.contains("CONTEXT FROM CONVERSATION"));
        assert!(!prompt.contains("DOCUMENTS UPLOADED IN THIS SESSION"));
        assert!(!has_uploaded_documents(&history));
    }
}
