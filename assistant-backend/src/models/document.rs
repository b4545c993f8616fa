use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion status of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "uploaded" => Some(DocumentStatus::Uploaded),
            "processing" => Some(DocumentStatus::Processing),
            "processed" => Some(DocumentStatus::Processed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }

    /// Marker used in the knowledge base listing
    pub fn icon(&self) -> &'static str {
        match self {
            DocumentStatus::Processed => "✓",
            DocumentStatus::Processing => "⏳",
            DocumentStatus::Uploaded | DocumentStatus::Failed => "✗",
        }
    }
}

impl Default for DocumentStatus {
    fn default() -> Self {
        DocumentStatus::Uploaded
    }
}

/// A tracked upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub file_path: String,
    pub file_type: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}
