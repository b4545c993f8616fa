//! Web search tool
//!
//! Two backends behind one `web_search` tool:
//! - Gemini with Google Search grounding (default)
//! - Tavily search API

use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolGroup, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const TAVILY_TIMEOUT: Duration = Duration::from_secs(15);
const GROUNDED_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LISTED_SOURCES: usize = 3;

const DESCRIPTION: &str = "Search the web for ANY information using Google Search grounding. \
This tool performs REAL web searches and provides current, accurate, up-to-date information.\n\n\
**CRITICAL - QUERY FORMULATION RULES:**\n\
- PRESERVE ALL details from user's query - do NOT simplify, paraphrase, or drop context\n\
- MAINTAIN exact product names, versions, specifications, and requirements\n\
- INCLUDE source requirements: if user says 'official site', 'brand website', 'go to X site' - add that to search\n\
- KEEP all qualifiers: 'current', 'latest', 'today', specific locations, etc.\n\
- Examples of CORRECT query preservation:\n\
  ✓ User: 'Go to Nike official site for shoe price' → Search: 'Nike official website shoe price'\n\
  ✓ User: 'Find MRP of Product X conditioner on brand site' → Search: 'Product X official brand site conditioner MRP'\n\
  ✗ WRONG: User mentions 'conditioner' → You search 'shampoo' (NEVER change product names!)\n\
  ✗ WRONG: User says 'brand site' → You search generic price (NEVER drop source requirements!)\n\
\n**Use this for:** current time/date, weather conditions, news, facts, definitions, product prices, company info, \
official websites, specific site information, research topics, 'what is X', 'how does Y work', 'latest Z'.\n\
\n**DO NOT use for:** uploaded documents (use rag_search), local files, or saved notes.";

enum SearchBackend {
    Gemini {
        api_key: Option<String>,
        base_url: String,
        model: String,
    },
    Tavily {
        api_key: Option<String>,
    },
}

/// Tool for real-time web search
pub struct WebSearchTool {
    definition: ToolDefinition,
    backend: SearchBackend,
    client: reqwest::Client,
}

impl WebSearchTool {
    fn with_backend(backend: SearchBackend) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "query".to_string(),
            PropertySchema::string(
                "The search query or question requiring current/real-time information from the web",
            ),
        );

        WebSearchTool {
            definition: ToolDefinition {
                name: "web_search".to_string(),
                description: DESCRIPTION.to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["query".to_string()],
                },
                group: ToolGroup::Web,
            },
            backend,
            client: reqwest::Client::new(),
        }
    }

    /// Gemini grounded search. `api_key` is the search key, already
    /// resolved against the main key.
    pub fn gemini(api_key: Option<String>, base_url: &str, model: &str) -> Self {
        Self::with_backend(SearchBackend::Gemini {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn tavily(api_key: Option<String>) -> Self {
        Self::with_backend(SearchBackend::Tavily { api_key })
    }

    async fn grounded_search(
        &self,
        query: &str,
        api_key: Option<&str>,
        base_url: &str,
        model: &str,
    ) -> Result<String, String> {
        let api_key = api_key.ok_or_else(|| "GEMINI_API_KEY is not set".to_string())?;
        log::info!("[WEB_SEARCH] Grounded query: {}", query);

        let url = format!("{}/v1beta/models/{}:generateContent", base_url, model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": query }] }],
            "tools": [{ "google_search": {} }],
            "generationConfig": { "temperature": 0.1 }
        });

        let resp = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .timeout(GROUNDED_SEARCH_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = resp.status();
        let value: Value = resp
            .json()
            .await
            .map_err(|e| format!("invalid response: {}", e))?;
        if !status.is_success() {
            let message = value["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(format!("Gemini API error ({}): {}", status, message));
        }

        let answer = parse_grounded_response(&value)?;
        log_grounding(&answer);
        Ok(answer.text)
    }

    async fn tavily_search(&self, query: &str, api_key: Option<&str>) -> String {
        log::info!("[WEB_SEARCH] Tavily query: {}", query);

        let payload = json!({
            "api_key": api_key.unwrap_or_default(),
            "query": query,
            "search_depth": "basic",
            "include_answer": true,
            "include_raw_content": false,
            "max_results": 5
        });

        let resp = match self
            .client
            .post(TAVILY_SEARCH_URL)
            .timeout(TAVILY_TIMEOUT)
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return "❌ Tavily search timed out. Please try again.".to_string(),
            Err(e) => return format!("❌ Error performing Tavily search: {}", e),
        };

        let status = resp.status();
        if !status.is_success() {
            let message = match status.as_u16() {
                401 => "Tavily API key is invalid or missing. Please check TAVILY_API_KEY in .env file."
                    .to_string(),
                429 => "Tavily API rate limit exceeded. Free tier: 1,000 searches/month.".to_string(),
                code => format!(
                    "Tavily API error: {} - {}",
                    code,
                    resp.text().await.unwrap_or_default()
                ),
            };
            log::error!("[WEB_SEARCH] {}", message);
            return format!("❌ {}", message);
        }

        match resp.json::<TavilyResponse>().await {
            Ok(data) => format_tavily_response(query, &data),
            Err(e) => format!("❌ Error performing Tavily search: {}", e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebSearchParams {
    query: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: WebSearchParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        match &self.backend {
            SearchBackend::Gemini {
                api_key,
                base_url,
                model,
            } => match self
                .grounded_search(&params.query, api_key.as_deref(), base_url, model)
                .await
            {
                Ok(text) => ToolResult::success(text).with_metadata(json!({
                    "provider": "gemini",
                    "query": params.query,
                })),
                Err(e) => {
                    log::error!("[WEB_SEARCH] Grounded search failed: {}", e);
                    ToolResult::error(format!(
                        "I encountered an error while searching the web: {}",
                        e
                    ))
                }
            },
            SearchBackend::Tavily { api_key } => {
                let text = self.tavily_search(&params.query, api_key.as_deref()).await;
                if text.starts_with('❌') {
                    ToolResult::error(text)
                } else {
                    ToolResult::success(text).with_metadata(json!({
                        "provider": "tavily",
                        "query": params.query,
                    }))
                }
            }
        }
    }
}

/// Answer text plus what the grounding layer reports about it
#[derive(Debug, Default)]
struct GroundedAnswer {
    text: String,
    grounded: bool,
    search_queries: Vec<String>,
    /// (title, uri)
    sources: Vec<(String, String)>,
}

fn parse_grounded_response(value: &Value) -> Result<GroundedAnswer, String> {
    let candidate = value["candidates"]
        .get(0)
        .ok_or_else(|| "no candidates in response".to_string())?;

    let text = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
        .trim()
        .to_string();

    if text.is_empty() {
        let reason = candidate["finishReason"].as_str().unwrap_or("UNKNOWN");
        return Err(format!("empty response (finish reason: {})", reason));
    }

    let metadata = &candidate["groundingMetadata"];
    let mut answer = GroundedAnswer {
        text,
        grounded: metadata.is_object(),
        ..Default::default()
    };

    if let Some(queries) = metadata["webSearchQueries"].as_array() {
        answer.search_queries = queries
            .iter()
            .filter_map(|q| q.as_str().map(String::from))
            .collect();
    }
    if let Some(chunks) = metadata["groundingChunks"].as_array() {
        answer.sources = chunks
            .iter()
            .filter_map(|c| {
                let web = c.get("web")?;
                Some((
                    web["title"].as_str().unwrap_or("N/A").to_string(),
                    web["uri"].as_str().unwrap_or("unknown").to_string(),
                ))
            })
            .collect();
    }
    Ok(answer)
}

fn log_grounding(answer: &GroundedAnswer) {
    if !answer.grounded {
        log::warn!("[WEB_SEARCH] No grounding metadata, the answer may come from model knowledge only");
        return;
    }
    if !answer.search_queries.is_empty() {
        log::info!("[WEB_SEARCH] Grounding active, search queries: {:?}", answer.search_queries);
    }
    if !answer.sources.is_empty() {
        log::info!("[WEB_SEARCH] Grounding active, {} web sources", answer.sources.len());
        for (i, (title, uri)) in answer.sources.iter().take(MAX_LISTED_SOURCES).enumerate() {
            log::info!("[WEB_SEARCH]   Source {}: {} - {}", i + 1, title, uri);
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

fn format_tavily_response(query: &str, data: &TavilyResponse) -> String {
    if let Some(answer) = data.answer.as_deref().filter(|a| !a.is_empty()) {
        let mut out = answer.to_string();
        if !data.results.is_empty() {
            let sources: Vec<String> = data
                .results
                .iter()
                .take(MAX_LISTED_SOURCES)
                .enumerate()
                .map(|(i, r)| {
                    format!(
                        "{}. {}\n   {}",
                        i + 1,
                        r.title.as_deref().unwrap_or("Unknown"),
                        r.url.as_deref().unwrap_or("")
                    )
                })
                .collect();
            out.push_str("\n\n📚 Sources:\n");
            out.push_str(&sources.join("\n"));
        }
        return out;
    }

    if !data.results.is_empty() {
        let mut out = format!("Web search results for: {}\n\n", query);
        for (i, r) in data.results.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}\n{}\n{}\n\n",
                i + 1,
                r.title.as_deref().unwrap_or("No title"),
                r.content.as_deref().unwrap_or("No description"),
                r.url.as_deref().unwrap_or("")
            ));
        }
        return out;
    }

    format!("No search results found for: {}", query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_search_definition() {
        let tool = WebSearchTool::tavily(None);
        let def = tool.definition();
        assert_eq!(def.name, "web_search");
        assert_eq!(def.group, ToolGroup::Web);
        assert_eq!(def.input_schema.required, vec!["query".to_string()]);
    }

    #[test]
    fn test_parse_grounded_response() {
        let value = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "It is 14:05 " }, { "text": "in Tokyo." }] },
                "groundingMetadata": {
                    "webSearchQueries": ["current time Tokyo"],
                    "groundingChunks": [
                        { "web": { "uri": "https://time.is/Tokyo", "title": "time.is" } },
                        { "retrievedContext": {} }
                    ]
                }
            }]
        });
        let answer = parse_grounded_response(&value).unwrap();
        assert_eq!(answer.text, "It is 14:05 in Tokyo.");
        assert!(answer.grounded);
        assert_eq!(answer.search_queries, vec!["current time Tokyo"]);
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].1, "https://time.is/Tokyo");
    }

    #[test]
    fn test_parse_grounded_response_errors() {
        assert!(parse_grounded_response(&json!({})).is_err());
        let blocked = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        let err = parse_grounded_response(&blocked).unwrap_err();
        assert!(err.contains("SAFETY"));

        let ungrounded = json!({ "candidates": [{ "content": { "parts": [{ "text": "hi" }] } }] });
        assert!(!parse_grounded_response(&ungrounded).unwrap().grounded);
    }

    #[test]
    fn test_format_tavily_answer_with_sources() {
        let data: TavilyResponse = serde_json::from_value(json!({
            "answer": "Rust 1.80 was released in July 2024.",
            "results": [
                { "title": "Rust Blog", "url": "https://blog.rust-lang.org" },
                { "title": "Releases", "url": "https://github.com/rust-lang/rust/releases" },
                { "title": "News", "url": "https://news.example" },
                { "title": "Extra", "url": "https://extra.example" }
            ]
        }))
        .unwrap();
        let text = format_tavily_response("rust release", &data);
        assert!(text.starts_with("Rust 1.80 was released"));
        assert!(text.contains("📚 Sources:\n1. Rust Blog\n   https://blog.rust-lang.org"));
        assert!(text.contains("3. News"));
        assert!(!text.contains("Extra"));
    }

    #[test]
    fn test_format_tavily_fallbacks() {
        let raw: TavilyResponse = serde_json::from_value(json!({
            "results": [{ "title": "A", "content": "body", "url": "https://a" }]
        }))
        .unwrap();
        assert_eq!(
            format_tavily_response("q", &raw),
            "Web search results for: q\n\n1. A\nbody\nhttps://a\n\n"
        );

        let empty: TavilyResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(format_tavily_response("q", &empty), "No search results found for: q");
    }

    #[tokio::test]
    async fn test_gemini_without_key_reports_error() {
        let tool = WebSearchTool::gemini(None, "http://127.0.0.1:1", "gemini-2.5-flash");
        let result = tool
            .execute(json!({"query": "weather"}), &ToolContext::new())
            .await;
        assert!(!result.success);
        assert_eq!(
            result.content,
            "I encountered an error while searching the web: GEMINI_API_KEY is not set"
        );
    }
}
