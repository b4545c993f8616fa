use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolGroup, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::models::{Document, DocumentStatus};

/// Lists uploaded documents and knowledge base size
pub struct DocumentInfoTool {
    definition: ToolDefinition,
}

impl DocumentInfoTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "query".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "Action to perform: 'list' to see all documents, or specific filename to get details"
                    .to_string(),
                default: Some(json!("list")),
                items: None,
                enum_values: None,
            },
        );

        DocumentInfoTool {
            definition: ToolDefinition {
                name: "check_available_documents".to_string(),
                description: "Check what documents are currently available in the knowledge base. \
                    Use this when the user asks 'what documents do I have?', 'what files are uploaded?', \
                    'show me my documents', or before performing RAG search to verify documents exist. \
                    Returns list of uploaded documents with their status."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec![],
                },
                group: ToolGroup::Documents,
            },
        }
    }
}

impl Default for DocumentInfoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct DocumentInfoParams {
    #[serde(default = "default_query")]
    query: String,
}

fn default_query() -> String {
    "list".to_string()
}

#[async_trait]
impl Tool for DocumentInfoTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params: DocumentInfoParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };
        log::info!("[RAG] Checking available documents: {}", params.query);

        let db = match &context.database {
            Some(db) => db,
            None => return ToolResult::error("Error checking documents: database not available"),
        };

        let total_chunks = match &context.vector_store {
            Some(store) => match store.stats() {
                Ok(stats) => stats.total_chunks,
                Err(e) => return ToolResult::error(format!("Error checking documents: {}", e)),
            },
            None => 0,
        };

        let documents = match db.list_documents() {
            Ok(docs) => docs,
            Err(e) => return ToolResult::error(format!("Error checking documents: {}", e)),
        };

        if documents.is_empty() {
            return ToolResult::success(
                "No documents have been uploaded to the knowledge base yet. \
                 You can upload PDF or TXT files to search through them later.",
            );
        }

        ToolResult::success(format_documents(&documents, total_chunks)).with_metadata(json!({
            "documents": documents.len(),
            "chunks": total_chunks,
        }))
    }
}

fn format_documents(documents: &[Document], total_chunks: i64) -> String {
    let mut lines = vec![
        "Knowledge Base Status:".to_string(),
        format!("- Total documents: {}", documents.len()),
        format!("- Total searchable chunks: {}", total_chunks),
        "\nUploaded Documents:\n".to_string(),
    ];

    for (i, doc) in documents.iter().enumerate() {
        lines.push(format!(
            "{}. {} {}\n   Type: {}\n   Status: {}\n   Uploaded: {}\n",
            i + 1,
            doc.status.icon(),
            doc.filename,
            doc.file_type.to_uppercase(),
            doc.status.as_str(),
            doc.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }

    let mut out = lines.join("\n");
    if documents.iter().any(|d| d.status == DocumentStatus::Processed) {
        out.push_str("\nYou can ask questions about these documents and I'll search through them for answers.");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use std::sync::Arc;

    #[test]
    fn test_document_info_definition() {
        let def = DocumentInfoTool::new().definition();
        assert_eq!(def.name, "check_available_documents");
        assert!(def.input_schema.required.is_empty());
    }

    #[tokio::test]
    async fn test_lists_documents_with_status() {
        let db = Arc::new(Database::in_memory().unwrap());
        let ctx = ToolContext::new().with_database(db.clone());

        let empty = DocumentInfoTool::new().execute(json!({}), &ctx).await;
        assert!(empty.content.starts_with("No documents have been uploaded"));

        db.create_document("paper.pdf", "/d/paper.pdf", "pdf", DocumentStatus::Processed)
            .unwrap();
        db.create_document("draft.txt", "/d/draft.txt", "txt", DocumentStatus::Failed)
            .unwrap();

        let result = DocumentInfoTool::new().execute(json!({"query": "list"}), &ctx).await;
        assert!(result.success);
        assert!(result.content.starts_with("Knowledge Base Status:\n- Total documents: 2\n- Total searchable chunks: 0"));
        assert!(result.content.contains("1. ✗ draft.txt\n   Type: TXT\n   Status: failed"));
        assert!(result.content.contains("2. ✓ paper.pdf\n   Type: PDF\n   Status: processed"));
        assert!(result.content.ends_with("I'll search through them for answers."));
    }
}
