//! Cross-encoder re-ranking of vector search candidates.
//!
//! ```text
//! POST {url}/rerank  {"query": "...", "documents": [...]}  ->  {"scores": [f32, ...]}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::vector_store::SearchResult;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// One relevance score per document, higher is more relevant
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, String>;
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

pub struct RemoteReranker {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteReranker {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Reranker for RemoteReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, String> {
        let resp = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&RerankRequest { query, documents })
            .send()
            .await
            .map_err(|e| format!("Rerank server unreachable: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Rerank server error ({})", resp.status()));
        }

        let parsed: RerankResponse = resp
            .json()
            .await
            .map_err(|e| format!("Invalid rerank response: {}", e))?;
        Ok(parsed.scores)
    }
}

/// Re-order candidates by cross-encoder score and keep the best `top_k`.
/// Any failure falls back to the incoming order, truncated.
pub async fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    mut candidates: Vec<SearchResult>,
    top_k: usize,
) -> Vec<SearchResult> {
    if candidates.is_empty() {
        return candidates;
    }

    log::info!("[RAG] Re-ranking {} candidates", candidates.len());
    let documents: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();

    let scores = match reranker.score(query, &documents).await {
        Ok(scores) if scores.len() == candidates.len() => scores,
        Ok(scores) => {
            log::error!(
                "[RAG] Reranker returned {} scores for {} documents, keeping vector order",
                scores.len(),
                candidates.len()
            );
            candidates.truncate(top_k);
            return candidates;
        }
        Err(e) => {
            log::error!("[RAG] Re-ranking failed, keeping vector order: {}", e);
            candidates.truncate(top_k);
            return candidates;
        }
    };

    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.rerank_score = Some(score);
    }
    candidates.sort_by(|a, b| {
        b.rerank_score
            .unwrap_or(f32::MIN)
            .total_cmp(&a.rerank_score.unwrap_or(f32::MIN))
    });
    candidates.truncate(top_k);

    if let Some(top) = candidates.first().and_then(|c| c.rerank_score) {
        log::info!("[RAG] Re-ranking complete. Top result score: {:.3}", top);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::vector_store::ChunkMetadata;

    struct LengthReranker;

    #[async_trait]
    impl Reranker for LengthReranker {
        async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, String> {
            Ok(documents.iter().map(|d| d.len() as f32).collect())
        }
    }

    struct BrokenReranker;

    #[async_trait]
    impl Reranker for BrokenReranker {
        async fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>, String> {
            Err("connection refused".to_string())
        }
    }

    fn candidate(content: &str, similarity: f32) -> SearchResult {
        SearchResult {
            content: content.to_string(),
            metadata: ChunkMetadata {
                chunk_id: format!("chunk-{}", content),
                source: "doc.txt".to_string(),
                page: None,
                chunk_index: 0,
                session_id: None,
                document_id: None,
            },
            similarity_score: similarity,
            rerank_score: None,
        }
    }

    #[tokio::test]
    async fn test_rerank_sorts_by_score_and_truncates() {
        let candidates = vec![candidate("a", 0.9), candidate("ccc", 0.8), candidate("bb", 0.7)];
        let ranked = rerank(&LengthReranker, "q", candidates, 2).await;

        let order: Vec<&str> = ranked.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["ccc", "bb"]);
        assert_eq!(ranked[0].rerank_score, Some(3.0));
        // Vector similarity is preserved for display
        assert_eq!(ranked[0].similarity_score, 0.8);
    }

    #[tokio::test]
    async fn test_rerank_failure_keeps_original_order() {
        let candidates = vec![candidate("a", 0.9), candidate("ccc", 0.8), candidate("bb", 0.7)];
        let ranked = rerank(&BrokenReranker, "q", candidates, 2).await;

        let order: Vec<&str> = ranked.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["a", "ccc"]);
        assert!(ranked[0].rerank_score.is_none());
    }
}
