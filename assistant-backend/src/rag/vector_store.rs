//! Vector store over the `chunks` table.
//!
//! Chunks and their embeddings live in SQLite; search is an exhaustive
//! cosine scan over the (optionally session-filtered) chunk set, followed by
//! optional cross-encoder re-ranking. Query embeddings are cached.

use moka::sync::Cache;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::chunking::{Chunker, ChunkingStrategy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use super::embeddings::{cosine_similarity, l2_normalize, EmbeddingGenerator};
use super::loader;
use super::rerank::{self, Reranker};
use crate::db::tables::NewChunk;
use crate::db::Database;
use crate::models::assistant_config::RagConfig;

/// Candidates fetched per requested result when re-ranking
const RERANK_CANDIDATE_FACTOR: usize = 5;
const QUERY_CACHE_CAPACITY: u64 = 512;
const QUERY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Extra metadata attached to every chunk of an ingested document
#[derive(Debug, Clone, Default)]
pub struct IngestMetadata {
    pub session_id: Option<String>,
    pub document_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub status: IngestionStatus,
    pub message: String,
    pub chunks: usize,
    pub filename: Option<String>,
}

impl IngestionResult {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: IngestionStatus::Error,
            message: message.into(),
            chunks: 0,
            filename: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == IngestionStatus::Success
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub source: String,
    pub page: Option<i64>,
    pub chunk_index: i64,
    pub session_id: Option<String>,
    pub document_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query, higher is better
    pub similarity_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub total_chunks: i64,
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub reranking: bool,
}

pub struct VectorStore {
    db: Arc<Database>,
    embedder: Arc<dyn EmbeddingGenerator>,
    reranker: Option<Arc<dyn Reranker>>,
    chunker: Chunker,
    config: RagConfig,
    query_cache: Cache<String, Arc<Vec<f32>>>,
}

impl VectorStore {
    pub fn new(
        db: Arc<Database>,
        embedder: Arc<dyn EmbeddingGenerator>,
        reranker: Option<Arc<dyn Reranker>>,
        config: RagConfig,
    ) -> Self {
        let (chunk_size, chunk_overlap) = effective_sizes(&config);
        let chunker = Chunker::new(config.chunking_strategy, chunk_size, chunk_overlap);
        let reranker = if config.enable_reranking { reranker } else { None };

        log::info!(
            "[RAG] Vector store ready: collection={}, model={}, strategy={}, reranking={}",
            config.collection_name,
            embedder.model_name(),
            config.chunking_strategy.as_ref(),
            if reranker.is_some() { "enabled" } else { "disabled" }
        );

        Self {
            db,
            embedder,
            reranker,
            chunker,
            config,
            query_cache: Cache::builder()
                .max_capacity(QUERY_CACHE_CAPACITY)
                .time_to_live(QUERY_CACHE_TTL)
                .build(),
        }
    }

    pub fn reranking_enabled(&self) -> bool {
        self.reranker.is_some()
    }

    /// Load, chunk, embed and store a document. Failures are reported in
    /// the result rather than returned as errors.
    pub async fn ingest_document(&self, path: &Path, file_type: &str, metadata: IngestMetadata) -> IngestionResult {
        log::info!("[RAG] Ingesting document: {}", path.display());
        match self.try_ingest(path, file_type, &metadata).await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("Error ingesting document: {}", e);
                log::error!("[RAG] {}", message);
                IngestionResult::error(message)
            }
        }
    }

    async fn try_ingest(&self, path: &Path, file_type: &str, metadata: &IngestMetadata) -> Result<IngestionResult, String> {
        let owned_path = path.to_path_buf();
        let owned_type = file_type.to_string();
        let pages = tokio::task::spawn_blocking(move || loader::load_document(&owned_path, &owned_type))
            .await
            .map_err(|e| format!("Loader task failed: {}", e))??;

        if pages.iter().all(|p| p.content.trim().is_empty()) {
            return Ok(IngestionResult::error("No content found in document"));
        }

        let chunks = self.chunker.split_pages(&pages);
        if chunks.is_empty() {
            return Ok(IngestionResult::error("No content found in document"));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            ));
        }

        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, mut embedding)| {
                l2_normalize(&mut embedding);
                NewChunk {
                    document_id: metadata.document_id,
                    session_id: metadata.session_id.clone(),
                    source: chunk.source,
                    page: chunk.page,
                    chunk_index: chunk.chunk_index,
                    content: chunk.content,
                    embedding,
                }
            })
            .collect();

        let written = self
            .db
            .insert_chunks(&rows)
            .map_err(|e| format!("Failed to store chunks: {}", e))?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        log::info!(
            "[RAG] Ingested {} ({} chunks, session={:?})",
            filename.as_deref().unwrap_or("document"),
            written,
            metadata.session_id
        );

        Ok(IngestionResult {
            status: IngestionStatus::Success,
            message: "Document ingested successfully".to_string(),
            chunks: written,
            filename,
        })
    }

    /// Top `k` chunks for `query` (configured top_k when `None`), limited to
    /// `session_id` when given
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        use_reranking: bool,
        session_id: Option<&str>,
    ) -> Result<Vec<SearchResult>, String> {
        let k = k.unwrap_or(self.config.top_k).max(1);
        let reranker = if use_reranking { self.reranker.as_ref() } else { None };
        let retrieval_k = if reranker.is_some() { k * RERANK_CANDIDATE_FACTOR } else { k };

        log::info!(
            "[RAG] Searching for: {}... (k={}, session={:?})",
            query.chars().take(50).collect::<String>(),
            retrieval_k,
            session_id
        );

        let query_embedding = self.embed_query(query).await?;
        let stored = self
            .db
            .load_chunks(session_id)
            .map_err(|e| format!("Failed to load chunks: {}", e))?;

        let mut candidates: Vec<SearchResult> = stored
            .into_iter()
            .map(|chunk| SearchResult {
                similarity_score: cosine_similarity(&query_embedding, &chunk.embedding),
                content: chunk.content,
                metadata: ChunkMetadata {
                    chunk_id: chunk.id,
                    source: chunk.source,
                    page: chunk.page,
                    chunk_index: chunk.chunk_index,
                    session_id: chunk.session_id,
                    document_id: chunk.document_id,
                },
                rerank_score: None,
            })
            .collect();

        candidates.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        candidates.truncate(retrieval_k);
        log::info!("[RAG] Found {} candidate chunks from vector search", candidates.len());

        let results = match reranker {
            Some(reranker) => rerank::rerank(reranker.as_ref(), query, candidates, k).await,
            None => {
                candidates.truncate(k);
                candidates
            }
        };
        Ok(results)
    }

    async fn embed_query(&self, query: &str) -> Result<Arc<Vec<f32>>, String> {
        if let Some(cached) = self.query_cache.get(query) {
            return Ok(cached);
        }
        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let mut embedding = vectors
            .pop()
            .ok_or_else(|| "Embedding server returned no vector for query".to_string())?;
        l2_normalize(&mut embedding);
        let embedding = Arc::new(embedding);
        self.query_cache.insert(query.to_string(), embedding.clone());
        Ok(embedding)
    }

    pub fn stats(&self) -> Result<CollectionStats, String> {
        let total_chunks = self
            .db
            .count_chunks()
            .map_err(|e| format!("Failed to count chunks: {}", e))?;
        let (chunk_size, chunk_overlap) = effective_sizes(&self.config);
        Ok(CollectionStats {
            collection_name: self.config.collection_name.clone(),
            total_chunks,
            embedding_model: self.embedder.model_name().to_string(),
            chunk_size,
            chunk_overlap,
            reranking: self.reranking_enabled(),
        })
    }

    /// Remove every chunk. Returns the number removed.
    pub fn clear(&self) -> Result<usize, String> {
        let removed = self
            .db
            .delete_all_chunks()
            .map_err(|e| format!("Failed to clear knowledge base: {}", e))?;
        self.query_cache.invalidate_all();
        log::info!("[RAG] Cleared collection {} ({} chunks)", self.config.collection_name, removed);
        Ok(removed)
    }
}

/// Token chunking counts words, so the character defaults are swapped for
/// token defaults when left untouched
fn effective_sizes(config: &RagConfig) -> (usize, usize) {
    let untouched = config.chunk_size == DEFAULT_CHUNK_SIZE && config.chunk_overlap == DEFAULT_CHUNK_OVERLAP;
    if config.chunking_strategy == ChunkingStrategy::Token && untouched {
        ChunkingStrategy::Token.default_sizes()
    } else {
        (config.chunk_size, config.chunk_overlap)
    }
}
