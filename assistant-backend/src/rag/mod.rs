//! Retrieval-augmented generation: document loading, chunking, embeddings,
//! vector search and re-ranking.

pub mod chunking;
pub mod embeddings;
pub mod loader;
pub mod rerank;
pub mod vector_store;

pub use chunking::ChunkingStrategy;
pub use embeddings::{EmbeddingGenerator, RemoteEmbeddingGenerator};
pub use rerank::{RemoteReranker, Reranker};
pub use vector_store::{IngestMetadata, SearchResult, VectorStore};
