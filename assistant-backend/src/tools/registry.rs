use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::builtin;
use super::types::{ToolContext, ToolDefinition, ToolResult};
use crate::config::Config;
use crate::models::{AssistantConfig, WebSearchProvider};

/// A capability the agent can invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult;

    fn name(&self) -> String {
        self.definition().name
    }
}

/// Tools by name, kept in registration order so declarations sent to the
/// model are stable
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        } else {
            log::warn!("[TOOLS] Replaced existing tool '{}'", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Run a tool by name. Unknown names become an error result.
    pub async fn execute(&self, name: &str, params: Value, context: &ToolContext) -> ToolResult {
        match self.get(name) {
            Some(tool) => {
                log::info!(
                    "[TOOLS] Executing {} ({}) with {}",
                    name,
                    tool.definition().group.as_str(),
                    params
                );
                let result = tool.execute(params, context).await;
                if !result.success {
                    log::warn!("[TOOLS] {} failed: {}", name, result.content);
                }
                result
            }
            None => {
                log::warn!("[TOOLS] Model requested unknown tool '{}'", name);
                ToolResult::error(format!("Unknown tool: {}", name))
            }
        }
    }
}

/// Registry with every built-in tool the configuration enables
pub fn create_default_registry(config: &Config, assistant_config: &AssistantConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let web_search: Arc<dyn Tool> = match assistant_config.web_search_provider {
        WebSearchProvider::Gemini => Arc::new(builtin::WebSearchTool::gemini(
            config.search_api_key(),
            &assistant_config.llm.base_url,
            &assistant_config.llm.model,
        )),
        WebSearchProvider::Tavily => Arc::new(builtin::WebSearchTool::tavily(config.tavily_api_key.clone())),
    };
    registry.register(web_search);
    registry.register(Arc::new(builtin::RagSearchTool::new()));
    registry.register(Arc::new(builtin::DocumentInfoTool::new()));
    registry.register(Arc::new(builtin::ListNotesTool::new()));
    registry.register(Arc::new(builtin::SaveNoteTool::new()));
    registry.register(Arc::new(builtin::RetrieveNoteTool::new()));
    registry.register(Arc::new(builtin::EditNoteTool::new()));
    registry.register(Arc::new(builtin::ExecuteCommandTool::new()));
    registry.register(Arc::new(builtin::SystemInfoTool::new()));
    if assistant_config.weather_tool_enabled {
        registry.register(Arc::new(builtin::WeatherTool::new()));
    }

    log::info!(
        "[TOOLS] Registered {} tools: {}",
        registry.len(),
        registry.names().join(", ")
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            gemini_api_key: Some("key".to_string()),
            gemini_search_api_key: None,
            tavily_api_key: None,
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_url: ":memory:".to_string(),
        }
    }

    #[test]
    fn test_default_registry_tool_names() {
        let registry = create_default_registry(&test_config(), &AssistantConfig::default());
        assert_eq!(
            registry.names(),
            vec![
                "web_search",
                "rag_search",
                "check_available_documents",
                "list_notes",
                "save_note",
                "retrieve_note",
                "edit_note",
                "execute_command",
                "get_system_info",
            ]
        );
    }

    #[test]
    fn test_weather_tool_is_opt_in() {
        let mut assistant = AssistantConfig::default();
        assistant.weather_tool_enabled = true;
        assistant.web_search_provider = WebSearchProvider::Tavily;
        let registry = create_default_registry(&test_config(), &assistant);
        assert!(registry.get("get_weather").is_some());
        assert!(registry.get("web_search").is_some());
        assert_eq!(registry.definitions().len(), 10);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute("launch_rockets", serde_json::json!({}), &ToolContext::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.content, "Unknown tool: launch_rockets");
    }
}
