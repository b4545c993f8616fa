pub mod assistant_config;
pub mod conversation;
pub mod document;
pub mod note;

pub use assistant_config::{AssistantConfig, WebSearchProvider};
pub use conversation::{HistoryEntry, Role};
pub use document::{Document, DocumentStatus};
pub use note::Note;
