//! Sentence embeddings.
//!
//! The model runs in a sidecar process; `RemoteEmbeddingGenerator` talks to
//! it over HTTP:
//!
//! ```text
//! POST {url}/embed  {"texts": [...], "model": "..."}  ->  {"embeddings": [[f32; dim], ...]}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, String>;

    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Texts sent per request
const EMBED_BATCH_SIZE: usize = 64;

pub struct RemoteEmbeddingGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl RemoteEmbeddingGenerator {
    pub fn new(base_url: &str, model: &str, dimension: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, String> {
        let url = format!("{}/embed", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                texts,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| format!("Embedding server unreachable: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("Embedding server error ({}): {}", status, body));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| format!("Invalid embedding response: {}", e))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(format!(
                "Embedding server returned {} vectors for {} texts",
                parsed.embeddings.len(),
                texts.len()
            ));
        }
        if let Some(bad) = parsed.embeddings.iter().find(|v| v.len() != self.dimension) {
            return Err(format!(
                "Expected {}-dim embeddings, got {}",
                self.dimension,
                bad.len()
            ));
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingGenerator for RemoteEmbeddingGenerator {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, String> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Cosine similarity in [-1, 1]; zero when either vector has no length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom < 1e-12 {
        return 0.0;
    }
    dot / denom
}

/// Scale to unit length in place (zero vectors are left alone)
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
