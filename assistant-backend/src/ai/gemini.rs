//! Gemini `generateContent` client with function calling

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{ChatMessage, ChatModel, LlmResponse, ToolCall};
use crate::models::assistant_config::LlmConfig;
use crate::tools::ToolDefinition;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiClient {
    /// A missing key is reported on the first request so the server can
    /// still start without one.
    pub fn new(api_key: Option<String>, llm: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, system: &str, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "contents": build_contents(messages),
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        if !tools.is_empty() {
            let declarations: Vec<Value> = tools.iter().map(function_declaration).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        body
    }
}

/// Map neutral turns onto Gemini `contents`. Consecutive tool results are
/// grouped into one user turn of `functionResponse` parts.
fn build_contents(messages: &[ChatMessage]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();
    let mut pending_responses: Vec<Value> = Vec::new();

    let flush = |contents: &mut Vec<Value>, pending: &mut Vec<Value>| {
        if !pending.is_empty() {
            contents.push(json!({ "role": "user", "parts": std::mem::take(pending) }));
        }
    };

    for message in messages {
        match message {
            ChatMessage::ToolResult { name, content, .. } => {
                pending_responses.push(json!({
                    "functionResponse": {
                        "name": name,
                        "response": { "content": content }
                    }
                }));
            }
            ChatMessage::User(text) => {
                flush(&mut contents, &mut pending_responses);
                contents.push(json!({ "role": "user", "parts": [{ "text": text }] }));
            }
            ChatMessage::Assistant { text, tool_calls } => {
                flush(&mut contents, &mut pending_responses);
                let mut parts = Vec::new();
                if !text.is_empty() {
                    parts.push(json!({ "text": text }));
                }
                for call in tool_calls {
                    let mut part = json!({
                        "functionCall": { "name": call.name, "args": call.args }
                    });
                    if let Some(signature) = &call.signature {
                        part["thoughtSignature"] = json!(signature);
                    }
                    parts.push(part);
                }
                if parts.is_empty() {
                    parts.push(json!({ "text": "" }));
                }
                contents.push(json!({ "role": "model", "parts": parts }));
            }
        }
    }
    flush(&mut contents, &mut pending_responses);
    contents
}

fn function_declaration(tool: &ToolDefinition) -> Value {
    let mut declaration = json!({
        "name": tool.name,
        "description": tool.description,
    });
    if !tool.input_schema.properties.is_empty() {
        let schema = serde_json::to_value(&tool.input_schema).unwrap_or_else(|_| json!({}));
        declaration["parameters"] = to_gemini_schema(schema);
    }
    declaration
}

/// Gemini's schema dialect rejects `default` and expects upper-case types
fn to_gemini_schema(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let converted: Map<String, Value> = map
                .into_iter()
                .filter(|(key, _)| key != "default")
                .map(|(key, v)| match (key.as_str(), v) {
                    ("type", Value::String(t)) => (key, Value::String(t.to_uppercase())),
                    (_, v) => (key, to_gemini_schema(v)),
                })
                .collect();
            Value::Object(converted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(to_gemini_schema).collect()),
        other => other,
    }
}

/// Extract text and function calls from a `generateContent` response
fn parse_response(body: &Value) -> Result<LlmResponse, String> {
    let candidate = match body["candidates"].as_array().and_then(|c| c.first()) {
        Some(candidate) => candidate,
        None => {
            return match body["promptFeedback"]["blockReason"].as_str() {
                Some(reason) => Err(format!("Gemini blocked the prompt: {}", reason)),
                None => Err("Gemini returned no candidates".to_string()),
            };
        }
    };

    let parts = candidate["content"]["parts"].as_array();
    let finish_reason = candidate["finishReason"].as_str().unwrap_or("");
    if parts.map_or(true, |p| p.is_empty()) {
        return Err(match finish_reason {
            "" | "STOP" => "Gemini returned an empty response".to_string(),
            reason => format!("Gemini returned no content (finish reason: {})", reason),
        });
    }

    let mut response = LlmResponse::default();
    for part in parts.into_iter().flatten() {
        if let Some(text) = part["text"].as_str() {
            // Thought summaries are not part of the answer
            if !part["thought"].as_bool().unwrap_or(false) {
                response.text.push_str(text);
            }
        }
        if let Some(call) = part.get("functionCall") {
            let name = call["name"].as_str().unwrap_or_default().to_string();
            if name.is_empty() {
                continue;
            }
            response.tool_calls.push(ToolCall {
                id: call["id"]
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                name,
                args: call.get("args").cloned().unwrap_or_else(|| json!({})),
                signature: part["thoughtSignature"].as_str().map(|s| s.to_string()),
            });
        }
    }
    Ok(response)
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "GEMINI_API_KEY is not set".to_string())?;

        let body = self.build_request(system, messages, tools);
        log::debug!(
            "[AGENT] Gemini request: {} messages, {} tools",
            messages.len(),
            tools.len()
        );

        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Gemini request failed: {}", e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("Failed to read Gemini response: {}", e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
                .unwrap_or(text);
            log::error!("[AGENT] Gemini API error {}: {}", status, message);
            return Err(format!("Gemini API error ({}): {}", status.as_u16(), message));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| format!("Invalid Gemini response: {}", e))?;
        parse_response(&value)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::{RagSearchTool, SystemInfoTool};
    use crate::tools::registry::Tool;

    fn client() -> GeminiClient {
        GeminiClient::new(Some("k".to_string()), &LlmConfig::default())
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::user("hi")];
        let tools = vec![RagSearchTool::new().definition()];
        let body = client().build_request("be nice", &messages, &tools);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be nice");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);

        let decl = &body["tools"][0]["functionDeclarations"][0];
        assert_eq!(decl["name"], "rag_search");
        assert_eq!(decl["parameters"]["type"], "OBJECT");
        assert_eq!(decl["parameters"]["properties"]["k"]["type"], "INTEGER");
        assert!(decl["parameters"]["properties"]["k"].get("default").is_none());
        assert_eq!(decl["parameters"]["required"][0], "query");
    }

    #[test]
    fn test_no_tools_key_without_tools() {
        let body = client().build_request("", &[ChatMessage::user("hi")], &[]);
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
        let with_tool = client().build_request("", &[], &[SystemInfoTool::new().definition()]);
        assert!(with_tool["tools"][0]["functionDeclarations"][0].get("parameters").is_some());
    }

    #[test]
    fn test_tool_results_grouped_and_signature_echoed() {
        let call = |name: &str, sig: Option<&str>| ToolCall {
            id: format!("id_{}", name),
            name: name.to_string(),
            args: json!({"q": 1}),
            signature: sig.map(|s| s.to_string()),
        };
        let messages = vec![
            ChatMessage::user("check both"),
            ChatMessage::Assistant {
                text: String::new(),
                tool_calls: vec![call("a", Some("sig-1")), call("b", None)],
            },
            ChatMessage::ToolResult { call_id: "id_a".into(), name: "a".into(), content: "A".into() },
            ChatMessage::ToolResult { call_id: "id_b".into(), name: "b".into(), content: "B".into() },
        ];

        let contents = build_contents(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["thoughtSignature"], "sig-1");
        assert!(contents[1]["parts"][1].get("thoughtSignature").is_none());
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"].as_array().unwrap().len(), 2);
        assert_eq!(contents[2]["parts"][1]["functionResponse"]["response"]["content"], "B");
    }

    #[test]
    fn test_parse_function_call() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking", "thought": true},
                    {"functionCall": {"name": "rag_search", "args": {"query": "x"}}, "thoughtSignature": "abc"}
                ]},
                "finishReason": "STOP"
            }]
        });
        let response = parse_response(&body).unwrap();
        assert!(response.text.is_empty());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "rag_search");
        assert_eq!(response.tool_calls[0].args["query"], "x");
        assert_eq!(response.tool_calls[0].signature.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_text_and_errors() {
        let ok = json!({"candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "there"}]}}]});
        assert_eq!(parse_response(&ok).unwrap().text, "Hello there");

        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert_eq!(parse_response(&blocked).unwrap_err(), "Gemini blocked the prompt: SAFETY");

        let empty = json!({"candidates": [{"finishReason": "MAX_TOKENS", "content": {}}]});
        assert!(parse_response(&empty).unwrap_err().contains("MAX_TOKENS"));

        assert_eq!(parse_response(&json!({})).unwrap_err(), "Gemini returned no candidates");
    }

    #[tokio::test]
    async fn test_missing_key_is_error() {
        let client = GeminiClient::new(None, &LlmConfig::default());
        let err = client.generate("", &[ChatMessage::user("hi")], &[]).await.unwrap_err();
        assert_eq!(err, "GEMINI_API_KEY is not set");
    }
}
