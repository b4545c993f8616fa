//! Assistant configuration model backed by a RON file.
//!
//! Holds the tunables that are not secrets: app identity, LLM settings,
//! RAG parameters, web search provider and sidecar service URLs.
//! Loaded/saved from `config/assistant_config.ron`.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::rag::ChunkingStrategy;

pub const DEFAULT_WHISPER_SERVER_URL: &str = "http://127.0.0.1:9000";
pub const DEFAULT_TTS_SERVER_URL: &str = "http://127.0.0.1:9001";
pub const DEFAULT_EMBEDDINGS_SERVER_URL: &str = "http://127.0.0.1:9002";

/// Backend used by the `web_search` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebSearchProvider {
    /// Gemini with Google Search grounding
    #[default]
    Gemini,
    /// Tavily search API
    Tavily,
}

/// Top-level assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub web_search_provider: WebSearchProvider,
    #[serde(default)]
    pub weather_tool_enabled: bool,
    #[serde(default)]
    pub services: ServicesConfig,
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_tool_iterations: default_max_tool_iterations(),
            base_url: default_gemini_base_url(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub chunking_strategy: ChunkingStrategy,
    #[serde(default = "default_true")]
    pub enable_reranking: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection_name: default_collection_name(),
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            chunking_strategy: ChunkingStrategy::default(),
            enable_reranking: true,
        }
    }
}

/// External service URLs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub whisper_server_url: Option<String>,
    #[serde(default)]
    pub tts_server_url: Option<String>,
    #[serde(default)]
    pub embeddings_server_url: Option<String>,
    /// Cross-encoder sidecar. Unset disables re-ranking.
    #[serde(default)]
    pub rerank_server_url: Option<String>,
}

impl ServicesConfig {
    pub fn whisper_url(&self) -> String {
        self.whisper_server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_WHISPER_SERVER_URL.to_string())
    }

    pub fn tts_url(&self) -> String {
        self.tts_server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_TTS_SERVER_URL.to_string())
    }

    pub fn embeddings_url(&self) -> String {
        self.embeddings_server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_EMBEDDINGS_SERVER_URL.to_string())
    }
}

fn default_app_name() -> String { "Personal Assistant".to_string() }
fn default_version() -> String { "1.0.0".to_string() }
fn default_llm_model() -> String { "gemini-2.5-flash".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 1024 }
fn default_max_tool_iterations() -> usize { 10 }
fn default_gemini_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_collection_name() -> String { "documents".to_string() }
fn default_embedding_model() -> String { "sentence-transformers/all-MiniLM-L6-v2".to_string() }
fn default_embedding_dimension() -> usize { 384 }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_top_k() -> usize { 3 }
fn default_true() -> bool { true }

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: default_version(),
            llm: LlmConfig::default(),
            rag: RagConfig::default(),
            web_search_provider: WebSearchProvider::default(),
            weather_tool_enabled: false,
            services: ServicesConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Load from the runtime config path, falling back to `Default` on any error.
    pub fn load() -> Self {
        let path = crate::config::assistant_config_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_ron(&content).unwrap_or_else(|e| {
                log::warn!("Failed to parse assistant_config.ron: {} (using defaults)", e);
                Self::default()
            }),
            Err(e) => {
                log::debug!("Could not read assistant_config.ron ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn from_ron(content: &str) -> Result<Self, String> {
        ron::from_str::<AssistantConfig>(content).map_err(|e| e.to_string())
    }

    /// Serialize to pretty RON and write to the runtime config path.
    pub fn save(&self) -> Result<(), String> {
        let path = crate::config::assistant_config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
        let pretty = ron::ser::PrettyConfig::default();
        let content = ron::ser::to_string_pretty(self, pretty)
            .map_err(|e| format!("Failed to serialize assistant config: {}", e))?;
        std::fs::write(&path, content)
            .map_err(|e| format!("Failed to write assistant_config.ron: {}", e))?;
        Ok(())
    }
}
