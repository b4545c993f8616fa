//! Shared tool types: declarations sent to the model, results returned to
//! it, and the per-call context tools run in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;
use crate::notes::NoteStore;
use crate::rag::VectorStore;

/// Coarse grouping used for logging and listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGroup {
    Web,
    Documents,
    Notes,
    System,
}

impl ToolGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolGroup::Web => "web",
            ToolGroup::Documents => "documents",
            ToolGroup::Notes => "notes",
            ToolGroup::System => "system",
        }
    }
}

/// JSON-schema subset describing one tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    /// Plain string parameter
    pub fn string(description: &str) -> Self {
        Self {
            schema_type: "string".to_string(),
            description: description.to_string(),
            default: None,
            items: None,
            enum_values: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    pub group: ToolGroup,
}

/// Outcome of a tool call. Both successes and failures are plain text the
/// model can read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            success: false,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Everything a tool may touch during one call. Services are optional so
/// tools can be exercised in isolation; a tool that needs a missing service
/// reports it as an error result.
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Conversation the call belongs to, used to tag documents and
    /// breadcrumbs
    pub session_id: Option<String>,
    pub database: Option<Arc<Database>>,
    pub vector_store: Option<Arc<VectorStore>>,
    pub notes: Option<Arc<NoteStore>>,
    /// Working directory for `execute_command`
    pub workspace_dir: Option<PathBuf>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.database = Some(db);
        self
    }

    pub fn with_vector_store(mut self, store: Arc<VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn with_notes(mut self, notes: Arc<NoteStore>) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn with_workspace_dir(mut self, dir: PathBuf) -> Self {
        self.workspace_dir = Some(dir);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_serializes_as_json_schema() {
        let mut properties = HashMap::new();
        let mut k = PropertySchema::string("How many");
        k.schema_type = "integer".to_string();
        k.default = Some(json!(3));
        properties.insert("k".to_string(), k);

        let schema = ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required: vec![],
        };
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["k"]["type"], "integer");
        assert_eq!(value["properties"]["k"]["default"], 3);
        assert!(value["properties"]["k"].get("enum").is_none());
    }

    #[test]
    fn test_context_builders() {
        let ctx = ToolContext::new()
            .with_session("abc")
            .with_workspace_dir(PathBuf::from("/tmp"));
        assert_eq!(ctx.session_id.as_deref(), Some("abc"));
        assert!(ctx.database.is_none());

        let result = ToolResult::error("nope").with_metadata(json!({"code": 1}));
        assert!(!result.success);
        assert_eq!(result.metadata.unwrap()["code"], 1);
    }
}
