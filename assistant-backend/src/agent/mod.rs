//! Tool-calling voice agent
//!
//! One `chat` call builds the system prompt from the session breadcrumbs,
//! replays recent history and then alternates between the model and the
//! tool registry until the model answers with text.

pub mod prompt;
pub mod turn;

pub use turn::run_chat_turn;

use serde::Serialize;
use std::sync::Arc;

use crate::ai::{ChatMessage, ChatModel};
use crate::models::{HistoryEntry, Role};
use crate::tools::{ToolContext, ToolRegistry};

/// Final answer of one chat call
#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub response: String,
    /// Tool names the model requested, first use order, no duplicates
    pub tools_used: Vec<String>,
    pub session_id: String,
}

pub struct VoiceAgent {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    max_iterations: usize,
}

impl VoiceAgent {
    pub fn new(model: Arc<dyn ChatModel>, registry: Arc<ToolRegistry>, max_iterations: usize) -> Self {
        log::info!(
            "[AGENT] Initialized with model {} and {} tools",
            model.model_name(),
            registry.len()
        );
        Self {
            model,
            registry,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Answer `message`. Failures are folded into the reply text so callers
    /// always get something to show or speak.
    pub async fn chat(
        &self,
        message: &str,
        session_id: &str,
        history: &[HistoryEntry],
        context: &ToolContext,
    ) -> AgentReply {
        log::info!("[AGENT] [Session: {}] User: {}", session_id, message);

        match self.run(message, session_id, history, context).await {
            Ok((response, tools_used)) => {
                let preview: String = response.chars().take(100).collect();
                log::info!("[AGENT] [Session: {}] Assistant: {}...", session_id, preview);
                if !tools_used.is_empty() {
                    log::info!("[AGENT] [Session: {}] Tools used: {:?}", session_id, tools_used);
                }
                AgentReply {
                    response,
                    tools_used,
                    session_id: session_id.to_string(),
                }
            }
            Err(e) => {
                log::error!("[AGENT] Error in agent chat: {}", e);
                AgentReply {
                    response: format!("I encountered an error: {}. Please try again.", e),
                    tools_used: Vec::new(),
                    session_id: session_id.to_string(),
                }
            }
        }
    }

    async fn run(
        &self,
        message: &str,
        session_id: &str,
        history: &[HistoryEntry],
        context: &ToolContext,
    ) -> Result<(String, Vec<String>), String> {
        let system = prompt::build_system_prompt(history);
        if prompt::has_uploaded_documents(history) {
            log::info!("[AGENT] [Session: {}] Documents detected in session, prioritizing RAG search", session_id);
        }

        // System breadcrumbs already live in the system prompt
        let mut messages: Vec<ChatMessage> = history
            .iter()
            .filter_map(|entry| match entry.role {
                Role::User => Some(ChatMessage::user(entry.message.clone())),
                Role::Assistant => Some(ChatMessage::assistant(entry.message.clone())),
                Role::System => None,
            })
            .collect();
        messages.push(ChatMessage::user(message));

        let declarations = self.registry.definitions();
        let context = context.clone().with_session(session_id);
        let mut tools_used: Vec<String> = Vec::new();

        for _ in 0..self.max_iterations {
            let response = self.model.generate(&system, &messages, &declarations).await?;
            if !response.has_tool_calls() {
                return Ok((response.text, tools_used));
            }

            let names: Vec<&str> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
            log::info!("[AGENT] Agent calling tools: {:?}", names);

            messages.push(ChatMessage::Assistant {
                text: response.text.clone(),
                tool_calls: response.tool_calls.clone(),
            });

            for call in response.tool_calls {
                if !tools_used.contains(&call.name) {
                    tools_used.push(call.name.clone());
                }
                let result = self.registry.execute(&call.name, call.args, &context).await;
                messages.push(ChatMessage::ToolResult {
                    call_id: call.id,
                    name: call.name,
                    content: result.content,
                });
            }
        }

        Err(format!(
            "Agent stopped after {} tool iterations without a final answer",
            self.max_iterations
        ))
    }
}
