//! Knowledge base search over uploaded documents
//!
//! Results are limited to the active session's uploads when a session is set.

use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolGroup, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::rag::SearchResult;

const DEFAULT_K: usize = 3;

pub struct RagSearchTool {
    definition: ToolDefinition,
}

impl RagSearchTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();

        properties.insert(
            "query".to_string(),
            PropertySchema::string("The question or query to search in the knowledge base"),
        );
        properties.insert(
            "k".to_string(),
            PropertySchema {
                schema_type: "integer".to_string(),
                description: "Number of relevant documents to retrieve".to_string(),
                default: Some(json!(DEFAULT_K)),
                items: None,
                enum_values: None,
            },
        );

        RagSearchTool {
            definition: ToolDefinition {
                name: "rag_search".to_string(),
                description: "Search the knowledge base of uploaded documents (PDFs, TXTs) for specific information. \
                    Use this tool when: \
                    (1) System prompt indicates documents were uploaded in this session, \
                    (2) User asks questions about any topic that COULD be in uploaded documents, \
                    (3) User mentions 'the document', 'the file', 'the paper', 'the PDF', \
                    (4) User asks 'what is X?', 'explain Y', 'tell me about Z', 'summarize', 'key points', 'findings', \
                    (5) Any question that might be answered by document content. \
                    When documents are uploaded, check this FIRST before using web search or general knowledge. \
                    This searches actual uploaded files, NOT the internet. \
                    Skip only for: current time, weather, news, or topics completely unrelated to documents."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["query".to_string()],
                },
                group: ToolGroup::Documents,
            },
        }
    }
}

impl Default for RagSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct RagSearchParams {
    query: String,
    k: Option<usize>,
}

#[async_trait]
impl Tool for RagSearchTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params: RagSearchParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let store = match &context.vector_store {
            Some(store) => store,
            None => return ToolResult::error("Knowledge base not available."),
        };

        log::info!("[RAG] Searching knowledge base for: {}", params.query);

        let total_chunks = match store.stats() {
            Ok(stats) => stats.total_chunks,
            Err(e) => return ToolResult::error(format!("Error performing RAG search: {}", e)),
        };

        if total_chunks == 0 {
            return ToolResult::success(
                "The knowledge base is currently empty. No documents have been uploaded yet. \
                 Please upload documents using the /api/upload-document endpoint before querying.",
            );
        }

        let session_id = context.session_id.as_deref();
        if let Some(session) = session_id {
            log::info!("[RAG] Filtering search results to session: {}", session);
        }

        let k = params.k.unwrap_or(DEFAULT_K).max(1);
        let results = match store.search(&params.query, Some(k), true, session_id).await {
            Ok(results) => results,
            Err(e) => return ToolResult::error(format!("Error performing RAG search: {}", e)),
        };

        if results.is_empty() {
            return ToolResult::success(format!(
                "I searched through {} document chunks in the knowledge base, \
                 but couldn't find information relevant to '{}'. \
                 Try rephrasing your question or asking about different topics covered in the uploaded documents.",
                total_chunks, params.query
            ));
        }

        let sources = distinct_sources(&results);
        log::info!(
            "[RAG] Found {} relevant chunks from {} document(s)",
            results.len(),
            sources.len()
        );

        ToolResult::success(format_results(&results, &sources)).with_metadata(json!({
            "query": params.query,
            "count": results.len(),
            "sources": sources,
        }))
    }
}

/// Source file names in first-seen order
fn distinct_sources(results: &[SearchResult]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for result in results {
        let name = result
            .metadata
            .source
            .rsplit('/')
            .next()
            .unwrap_or(&result.metadata.source)
            .to_string();
        if !sources.contains(&name) {
            sources.push(name);
        }
    }
    sources
}

fn format_results(results: &[SearchResult], sources: &[String]) -> String {
    let mut parts = vec![format!(
        "Found {} relevant results in the knowledge base:\n",
        results.len()
    )];
    if !sources.is_empty() {
        parts.push(format!(
            "\nSearch results from document(s): '{}'\n",
            sources.join("', '")
        ));
    }

    for (i, result) in results.iter().enumerate() {
        let page = result
            .metadata
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        parts.push(format!(
            "\n--- Result {} (Relevance: {:.2}) ---\nSource: {} (Page {})\nContent: {}\n",
            i + 1,
            result.similarity_score,
            result.metadata.source,
            page,
            result.content
        ));
    }
    parts.join("\n")
}
