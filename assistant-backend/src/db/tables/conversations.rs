//! Conversation history operations
//!
//! Rows are ordered by insertion id, which follows creation time.

use chrono::Utc;
use rusqlite::{params, Result as SqliteResult, Row};

use super::super::sqlite::{format_timestamp, parse_timestamp};
use super::super::Database;
use crate::models::conversation::{ConversationMessage, HistoryEntry, Role};
use crate::models::note::DEFAULT_USER_ID;

/// Non-system messages replayed to the agent each turn
pub const RECENT_MESSAGE_LIMIT: usize = 5;

impl Database {
    pub fn add_conversation_message(
        &self,
        session_id: &str,
        role: Role,
        message: &str,
    ) -> SqliteResult<ConversationMessage> {
        let conn = self.conn.lock();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO conversations (user_id, session_id, role, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![DEFAULT_USER_ID, session_id, role.as_str(), message, format_timestamp(&now)],
        )?;

        Ok(ConversationMessage {
            id: conn.last_insert_rowid(),
            user_id: DEFAULT_USER_ID,
            session_id: session_id.to_string(),
            role,
            message: message.to_string(),
            created_at: now,
        })
    }

    /// The latest `limit` messages of a session in chronological order
    pub fn get_conversation(&self, session_id: &str, limit: usize) -> SqliteResult<Vec<ConversationMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, session_id, role, message, created_at FROM conversations
             WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut messages = stmt
            .query_map(params![session_id, limit as i64], Self::row_to_conversation)?
            .collect::<SqliteResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// History handed to the agent: every system breadcrumb of the session
    /// (oldest first), then the last few user/assistant messages in order.
    pub fn load_agent_history(&self, session_id: &str) -> SqliteResult<Vec<HistoryEntry>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, user_id, session_id, role, message, created_at FROM conversations
             WHERE session_id = ?1 AND role = 'system' ORDER BY id ASC",
        )?;
        let system = stmt
            .query_map([session_id], Self::row_to_conversation)?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, session_id, role, message, created_at FROM conversations
             WHERE session_id = ?1 AND role != 'system' ORDER BY id DESC LIMIT ?2",
        )?;
        let mut recent = stmt
            .query_map(
                params![session_id, RECENT_MESSAGE_LIMIT as i64],
                Self::row_to_conversation,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        recent.reverse();

        Ok(system
            .into_iter()
            .chain(recent)
            .map(HistoryEntry::from)
            .collect())
    }

    fn row_to_conversation(row: &Row) -> SqliteResult<ConversationMessage> {
        let role_str: String = row.get(3)?;
        let created_at: String = row.get(5)?;

        Ok(ConversationMessage {
            id: row.get(0)?,
            user_id: row.get(1)?,
            session_id: row.get(2)?,
            role: Role::from_str(&role_str).unwrap_or_default(),
            message: row.get(4)?,
            created_at: parse_timestamp(&created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_history_keeps_all_system_and_last_five() {
        let db = Database::in_memory().unwrap();
        let session = "s1";

        db.add_conversation_message(session, Role::System, "[SYSTEM] Document uploaded: 'a.pdf' (3 chunks).")
            .unwrap();
        for i in 0..8 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            db.add_conversation_message(session, role, &format!("msg {}", i)).unwrap();
        }
        db.add_conversation_message(session, Role::System, "[SYSTEM] Note saved: 'Ideas'").unwrap();
        db.add_conversation_message("other", Role::User, "not mine").unwrap();

        let history = db.load_agent_history(session).unwrap();
        assert_eq!(history.len(), 2 + RECENT_MESSAGE_LIMIT);

        assert_eq!(history[0].role, Role::System);
        assert!(history[0].message.contains("a.pdf"));
        assert_eq!(history[1].role, Role::System);
        assert!(history[1].message.contains("Ideas"));

        let recent: Vec<&str> = history[2..].iter().map(|h| h.message.as_str()).collect();
        assert_eq!(recent, vec!["msg 3", "msg 4", "msg 5", "msg 6", "msg 7"]);
    }

    #[test]
    fn test_get_conversation_is_chronological_and_limited() {
        let db = Database::in_memory().unwrap();
        for i in 0..4 {
            db.add_conversation_message("s", Role::User, &format!("m{}", i)).unwrap();
        }

        let msgs = db.get_conversation("s", 3).unwrap();
        let texts: Vec<&str> = msgs.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["m1", "m2", "m3"]);

        assert!(db.get_conversation("missing", 50).unwrap().is_empty());
    }
}
