use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Single-user installs store every note under this id
pub const DEFAULT_USER_ID: i64 = 1;

/// A saved note. The body also lives in a text file under `data/user_notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Title for display, falling back to the filename
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.filename)
    }
}
